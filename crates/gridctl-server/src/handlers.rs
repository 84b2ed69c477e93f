//! Command handlers run on the local host.

use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{info, warn};

use gridctl_control::{ControlCommand, ControlRequest, WaitPolicy, format_fragment};
use gridctl_core::Result;

use crate::admission::ServerState;
use crate::executor::{ControlExecutor, ExecutorRole};

impl ControlExecutor {
    /// Run `request`'s command in-process, appending its fragment to `output`.
    pub(crate) async fn run_local(&self, request: &ControlRequest, output: &mut String) -> Result<()> {
        match request.command {
            ControlCommand::Ping => self.ping(output),
            ControlCommand::Status => self.status(output),
            ControlCommand::Pause => self.pause(output),
            ControlCommand::Resume => self.resume(output),
            ControlCommand::Shutdown => self.shutdown(request.wait, output).await,
        }
    }

    fn ping(&self, output: &mut String) -> Result<()> {
        output.push_str(&format_fragment(&json!({ "status": "alive" })));
        Ok(())
    }

    fn status(&self, output: &mut String) -> Result<()> {
        let processes = &self.collab.processes;

        let companions: Vec<Value> = self
            .collab
            .companions
            .snapshot()
            .into_iter()
            .filter_map(|(name, pid)| {
                let pid = pid?;
                let age = processes.age(pid).map(|a| a.as_secs()).unwrap_or(0);
                Some(json!({ "name": name, "pid": pid, "age": age }))
            })
            .collect();

        let agents: Vec<Value> = self
            .collab
            .agents
            .agents()
            .into_iter()
            .map(|a| json!({ "agent_pid": a.pid, "age": a.age.as_secs() }))
            .collect();

        output.push_str(&format_fragment(&json!({
            "hostname": self.settings.local_host,
            "server_pid": std::process::id(),
            "status": self.state.get().as_str(),
            "companions": companions,
            "agents": agents,
        })));
        Ok(())
    }

    fn pause(&self, output: &mut String) -> Result<()> {
        output.push_str(&format_fragment(&json!({ "pausing": self.settings.local_host })));
        self.state.transition(ServerState::Paused)
    }

    fn resume(&self, output: &mut String) -> Result<()> {
        output.push_str(&format_fragment(&json!({ "resuming": self.settings.local_host })));
        self.state.transition(ServerState::Running)
    }

    async fn shutdown(&self, wait: WaitPolicy, output: &mut String) -> Result<()> {
        output.push_str(&format_fragment(
            &json!({ "shutting down": self.settings.local_host }),
        ));

        self.state.transition(ServerState::Paused)?;

        if self.role == ExecutorRole::RuleEngine {
            return self.state.transition(ServerState::Stopped);
        }

        let interval = self.settings.polling_interval;

        let drain_timeout = match wait {
            WaitPolicy::ForceAfter(secs) => Some(Duration::from_secs(secs)),
            WaitPolicy::Forever => None,
            WaitPolicy::None => Some(self.settings.timeout),
        };
        let agents = &self.collab.agents;
        if !poll_until(interval, drain_timeout, || agents.live_count() == 0).await {
            warn!(
                remaining = agents.live_count(),
                "Timed out waiting for agents to drain"
            );
        }

        self.terminate_companions();
        self.state.transition(ServerState::Stopped)?;

        let exit_timeout = match wait {
            WaitPolicy::ForceAfter(secs) => Duration::from_secs(secs),
            _ => self.settings.timeout,
        };
        let state = &self.state;
        if !poll_until(interval, Some(exit_timeout), || {
            state.get() == ServerState::Exited
        })
        .await
        {
            warn!("Timed out waiting for the server to exit");
        }

        Ok(())
    }

    /// Signal every companion with a stored pid; a missing pid means not running.
    fn terminate_companions(&self) {
        for (name, pid) in self.collab.companions.snapshot() {
            let Some(pid) = pid else {
                continue;
            };
            match self.collab.processes.terminate(pid) {
                Ok(()) => info!(companion = %name, pid, "Terminated companion process"),
                Err(e) => warn!(companion = %name, pid, error = %e, "Failed to terminate companion"),
            }
            self.collab.companions.set(&name, None);
        }
    }
}

/// Poll `done` every `interval` until it holds or `timeout` elapses.
///
/// `None` waits forever. Returns whether `done` held.
async fn poll_until(
    interval: Duration,
    timeout: Option<Duration>,
    mut done: impl FnMut() -> bool,
) -> bool {
    let start = Instant::now();
    loop {
        if done() {
            return true;
        }
        if timeout.is_some_and(|t| start.elapsed() >= t) {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
