//! External collaborators of the control executor.
//!
//! The executor never talks to the catalog, the network, worker processes or
//! companion processes directly; it goes through these seams so tests can
//! record and fake every interaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::json;
use tracing::{debug, error, warn};

use gridctl_control::{ControlRequest, format_fragment, open_reply, request_reply, seal_request};
use gridctl_core::constants::{ERROR_MARKER, LOCALHOST, PAUSED_SENTINEL, SUCCESS_SENTINEL};
use gridctl_core::{ControlSettings, Error, GridConfig, Result, SharedSecret};

// =============================================================================
// Catalog
// =============================================================================

/// Source of grid membership.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Distinct names of the live resource hosts, never including `localhost`.
    async fn resource_hosts(&self) -> Result<Vec<String>>;
}

/// Catalog backed by the configured resource host list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    hosts: Vec<String>,
}

impl StaticCatalog {
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        let mut distinct: Vec<String> = Vec::new();
        for host in hosts {
            if host != LOCALHOST && !distinct.contains(&host) {
                distinct.push(host);
            }
        }
        Self { hosts: distinct }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn resource_hosts(&self) -> Result<Vec<String>> {
        Ok(self.hosts.clone())
    }
}

// =============================================================================
// Forwarding
// =============================================================================

/// Sends a control request to a peer executor.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward `request` to `host`'s control endpoint on `port`.
    ///
    /// Appends the peer's fragments, or a failure fragment, to `output`.
    /// Returns an error when the peer could not be reached or answered with
    /// an error.
    async fn forward(
        &self,
        host: &str,
        port: u16,
        request: &ControlRequest,
        output: &mut String,
    ) -> Result<()>;
}

/// Forwarder speaking the sealed control protocol over TCP.
#[derive(Debug, Clone)]
pub struct TcpForwarder {
    secret: SharedSecret,
    timeout: Duration,
    endpoints: BTreeMap<String, String>,
}

impl TcpForwarder {
    pub fn new(secret: SharedSecret, timeout: Duration) -> Self {
        Self {
            secret,
            timeout,
            endpoints: BTreeMap::new(),
        }
    }

    /// Use fixed `host:port` addresses for some hosts (port argument ignored).
    pub fn with_endpoints(mut self, endpoints: BTreeMap<String, String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn endpoint(&self, host: &str, port: u16) -> String {
        self.endpoints
            .get(host)
            .cloned()
            .unwrap_or_else(|| format!("{}:{}", host, port))
    }
}

#[async_trait]
impl Forwarder for TcpForwarder {
    async fn forward(
        &self,
        host: &str,
        port: u16,
        request: &ControlRequest,
        output: &mut String,
    ) -> Result<()> {
        let endpoint = self.endpoint(host, port);
        debug!(%endpoint, command = %request.command, "Forwarding control request");

        let sealed = seal_request(&self.secret, request)?;

        let reply = match request_reply(&endpoint, &sealed, self.timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(%endpoint, error = %e, "Failed to reach control endpoint");
                output.push_str(&format_fragment(&json!({ "failed_to_connect": endpoint })));
                return Err(Error::Transport {
                    message: format!("failed to connect to {}: {}", endpoint, e),
                });
            }
        };

        if reply.is_empty() {
            error!(%endpoint, "Empty control reply");
            output.push_str(&format_fragment(
                &json!({ "response_message_is_empty_from": endpoint }),
            ));
            return Err(Error::Transport {
                message: format!("empty reply from {}", endpoint),
            });
        }

        let text = match open_reply(&self.secret, &reply) {
            Ok(text) => text,
            Err(e) => {
                error!(%endpoint, error = %e, "Failed to decrypt control reply");
                output.push_str(&format_fragment(
                    &json!({ "failed_to_decrypt_message_from": endpoint }),
                ));
                return Err(e);
            }
        };

        if text.contains(ERROR_MARKER) {
            error!(%endpoint, reply = %text, "Peer reported an error");
            output.push_str(&format_fragment(&json!({
                "invalid_message_format_from": endpoint,
                "error": text,
            })));
            return Err(Error::Transport {
                message: format!("{} replied: {}", endpoint, text),
            });
        }

        if text == PAUSED_SENTINEL {
            warn!(%endpoint, "Peer is paused");
            output.push_str(&format_fragment(&json!({ "server_paused": host })));
            return Ok(());
        }

        if text != SUCCESS_SENTINEL {
            output.push_str(&text);
        }
        Ok(())
    }
}

// =============================================================================
// Agents
// =============================================================================

/// One live per-client worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentInfo {
    pub pid: i32,
    pub age: Duration,
}

/// Live view of the per-client worker processes.
pub trait AgentMonitor: Send + Sync {
    fn agents(&self) -> Vec<AgentInfo>;

    fn live_count(&self) -> usize {
        self.agents().len()
    }
}

/// Agent registry maintained by the accept loop.
#[derive(Debug, Default)]
pub struct AgentTable {
    agents: Mutex<HashMap<i32, Instant>>,
}

impl AgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly spawned worker.
    pub fn register(&self, pid: i32) {
        if let Ok(mut agents) = self.agents.lock() {
            agents.insert(pid, Instant::now());
        }
    }

    /// Forget a worker that exited.
    pub fn remove(&self, pid: i32) {
        if let Ok(mut agents) = self.agents.lock() {
            agents.remove(&pid);
        }
    }
}

impl AgentMonitor for AgentTable {
    fn agents(&self) -> Vec<AgentInfo> {
        let Ok(agents) = self.agents.lock() else {
            return Vec::new();
        };
        let mut list: Vec<AgentInfo> = agents
            .iter()
            .map(|(&pid, started)| AgentInfo {
                pid,
                age: started.elapsed(),
            })
            .collect();
        list.sort_by_key(|a| a.pid);
        list
    }

    fn live_count(&self) -> usize {
        self.agents.lock().map(|a| a.len()).unwrap_or(0)
    }
}

// =============================================================================
// Processes
// =============================================================================

/// OS process primitives used for companion processes.
pub trait ProcessControl: Send + Sync {
    /// Ask the process to terminate.
    fn terminate(&self, pid: i32) -> Result<()>;

    /// How long the process has been running, if it exists.
    fn age(&self, pid: i32) -> Option<Duration>;
}

/// Signals processes with `SIGTERM`; reads ages from `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProcessControl;

impl ProcessControl for SignalProcessControl {
    fn terminate(&self, pid: i32) -> Result<()> {
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| Error::Process {
            message: format!("failed to signal pid {}: {}", pid, e),
        })
    }

    fn age(&self, pid: i32) -> Option<Duration> {
        let started = std::fs::metadata(format!("/proc/{}", pid))
            .and_then(|m| m.modified())
            .ok()?;
        SystemTime::now().duration_since(started).ok()
    }
}

/// Companion process name to stored pid, seeded from configuration.
#[derive(Debug, Default)]
pub struct CompanionTable {
    pids: RwLock<BTreeMap<String, Option<i32>>>,
}

impl CompanionTable {
    pub fn new(pids: BTreeMap<String, Option<i32>>) -> Self {
        Self {
            pids: RwLock::new(pids),
        }
    }

    /// Store (or clear) the pid of a companion.
    pub fn set(&self, name: &str, pid: Option<i32>) {
        if let Ok(mut pids) = self.pids.write() {
            pids.insert(name.to_string(), pid);
        }
    }

    /// Stored pid; `None` means "not running".
    pub fn get(&self, name: &str) -> Option<i32> {
        self.pids.read().ok()?.get(name).copied().flatten()
    }

    /// All companions in name order.
    pub fn snapshot(&self) -> Vec<(String, Option<i32>)> {
        self.pids
            .read()
            .map(|pids| pids.iter().map(|(n, p)| (n.clone(), *p)).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// Every collaborator an executor uses.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub forwarder: Arc<dyn Forwarder>,
    pub agents: Arc<dyn AgentMonitor>,
    pub processes: Arc<dyn ProcessControl>,
    pub companions: Arc<CompanionTable>,
}

impl Collaborators {
    /// Default collaborators built from configuration.
    pub fn from_config(config: &GridConfig, settings: &ControlSettings) -> Self {
        Self {
            catalog: Arc::new(StaticCatalog::new(config.resource_hosts.iter().cloned())),
            forwarder: Arc::new(
                TcpForwarder::new(settings.secret.clone(), settings.timeout)
                    .with_endpoints(config.endpoints.clone()),
            ),
            agents: Arc::new(AgentTable::new()),
            processes: Arc::new(SignalProcessControl),
            companions: Arc::new(CompanionTable::new(config.companions.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_catalog_filters_localhost_and_duplicates() {
        let catalog = StaticCatalog::new(
            ["alpha", "localhost", "beta", "alpha"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(catalog.resource_hosts().await.unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn agent_table_register_remove() {
        let table = AgentTable::new();
        assert_eq!(table.live_count(), 0);
        table.register(200);
        table.register(100);
        assert_eq!(table.live_count(), 2);
        let pids: Vec<i32> = table.agents().iter().map(|a| a.pid).collect();
        assert_eq!(pids, vec![100, 200]);
        table.remove(100);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn companion_table() {
        let mut seed = BTreeMap::new();
        seed.insert("rule_engine".to_string(), Some(4242));
        seed.insert("xmsg".to_string(), None);
        let table = CompanionTable::new(seed);

        assert_eq!(table.get("rule_engine"), Some(4242));
        assert_eq!(table.get("xmsg"), None);
        assert_eq!(table.get("absent"), None);

        table.set("rule_engine", None);
        assert_eq!(table.get("rule_engine"), None);
        assert_eq!(table.snapshot().len(), 2);
    }

    #[test]
    fn own_process_has_an_age() {
        let age = SignalProcessControl.age(std::process::id() as i32);
        assert!(age.is_some());
    }

    #[test]
    fn tcp_forwarder_endpoint_override() {
        let secret = SharedSecret::new(&b"k"[..], "AES-256-CBC", 16);
        let mut endpoints = BTreeMap::new();
        endpoints.insert("beta".to_string(), "127.0.0.1:7000".to_string());
        let forwarder = TcpForwarder::new(secret, Duration::from_secs(1)).with_endpoints(endpoints);
        assert_eq!(forwarder.endpoint("beta", 1248), "127.0.0.1:7000");
        assert_eq!(forwarder.endpoint("gamma", 1262), "gamma:1262");
    }

    #[tokio::test]
    async fn tcp_forwarder_reports_unreachable_peer() {
        let addr = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().to_string()
        };
        let secret = SharedSecret::new(&b"k"[..], "AES-256-CBC", 16);
        let mut endpoints = BTreeMap::new();
        endpoints.insert("beta".to_string(), addr.clone());
        let forwarder = TcpForwarder::new(secret, Duration::from_secs(1)).with_endpoints(endpoints);

        let request = ControlRequest::new(
            gridctl_control::ControlCommand::Ping,
            gridctl_control::TargetSelector::Hosts(vec!["beta".into()]),
        );
        let mut output = String::new();
        let err = forwarder
            .forward("beta", 1248, &request, &mut output)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(output.contains("failed_to_connect"));
        assert!(output.contains(&addr));
    }
}
