//! Operator CLI implementation.
//!
//! `gridctl <action> [--force-after=N | --wait-forever] (--all | --hosts=h1,h2,...)`

use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser, ValueEnum};

use gridctl_control::{ControlCommand, ControlRequest, TargetSelector, WaitPolicy};

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for gridctl_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => gridctl_core::LogFormat::Text,
            CliLogFormat::Json => gridctl_core::LogFormat::Json,
        }
    }
}

/// Lifecycle action to run on the selected hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Report admission state, companions and agents
    Status,
    /// Check that the control plane answers
    Ping,
    /// Stop admitting new client connections
    Pause,
    /// Admit client connections again
    Resume,
    /// Drain agents, stop companions and exit
    Shutdown,
}

impl From<ActionArg> for ControlCommand {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Status => ControlCommand::Status,
            ActionArg::Ping => ControlCommand::Ping,
            ActionArg::Pause => ControlCommand::Pause,
            ActionArg::Resume => ControlCommand::Resume,
            ActionArg::Shutdown => ControlCommand::Shutdown,
        }
    }
}

/// gridctl - grid control plane tool.
#[derive(Debug, Parser)]
#[command(
    name = "gridctl",
    version,
    about = "gridctl - pause, resume, shut down and inspect grid servers"
)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["all", "hosts"])
))]
pub struct Cli {
    /// Action to run
    #[arg(value_name = "ACTION")]
    pub action: ActionArg,

    /// Apply to every server in the grid
    #[arg(long = "all")]
    pub all: bool,

    /// Apply to these servers only (comma-separated)
    #[arg(long = "hosts", value_name = "HOSTS", value_delimiter = ',', num_args = 1)]
    pub hosts: Option<Vec<String>>,

    /// Shutdown: stop waiting for agents after N seconds
    #[arg(long = "force-after", value_name = "SECONDS", conflicts_with = "wait_forever")]
    pub force_after: Option<u64>,

    /// Shutdown: wait for every agent to finish
    #[arg(long = "wait-forever")]
    pub wait_forever: bool,

    /// Grid configuration file (default: $GRIDCTL_CONFIG, then /etc/gridctl/server_config.json)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    pub fn target(&self) -> TargetSelector {
        match &self.hosts {
            Some(hosts) if !self.all => TargetSelector::Hosts(
                hosts
                    .iter()
                    .map(|h| h.trim())
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => TargetSelector::All,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        match (self.force_after, self.wait_forever) {
            (Some(secs), _) => WaitPolicy::ForceAfter(secs),
            (None, true) => WaitPolicy::Forever,
            (None, false) => WaitPolicy::None,
        }
    }

    /// The one request this invocation sends.
    pub fn to_request(&self) -> ControlRequest {
        ControlRequest::new(self.action.into(), self.target()).with_wait(self.wait_policy())
    }
}
