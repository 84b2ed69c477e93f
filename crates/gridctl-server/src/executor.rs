//! Control executor.
//!
//! Owns the command table, the receive loop, host validation, notification
//! ordering and forwarding. One executor serves one control port, and every
//! request it receives is processed to completion before the next one, so no
//! two commands mutate the admission state concurrently.
//!
//! Ordering around the catalog-provider host:
//!
//! ```text
//! resume:      catalog -> (sleep) -> local -> remaining hosts
//! all others:  remaining hosts -> local -> catalog
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use gridctl_control::{
    ControlCommand, ControlListener, ControlRequest, TargetSelector, format_fragment,
    open_request, seal_reply,
};
use gridctl_core::constants::{ERROR_MARKER, LOCALHOST, PAUSED_SENTINEL, SUCCESS_SENTINEL};
use gridctl_core::{
    ControlSettings, Error, GridConfig, Result, compare_host_names, is_host_in_list,
};

use crate::admission::{AdmissionState, ServerState};
use crate::collaborators::Collaborators;

/// Which server process an executor controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorRole {
    /// The main server: draining shutdown.
    Server,
    /// The rule engine server: immediate shutdown.
    RuleEngine,
}

impl ExecutorRole {
    /// Control port this role listens on.
    pub fn port(&self, settings: &ControlSettings) -> u16 {
        match self {
            ExecutorRole::Server => settings.port,
            ExecutorRole::RuleEngine => settings.rule_engine_port,
        }
    }
}

/// Executes control requests for one server process.
pub struct ControlExecutor {
    pub(crate) role: ExecutorRole,
    pub(crate) settings: ControlSettings,
    pub(crate) state: Arc<AdmissionState>,
    pub(crate) collab: Collaborators,
}

impl ControlExecutor {
    /// Build an executor with explicit collaborators.
    pub fn new(
        role: ExecutorRole,
        settings: ControlSettings,
        state: Arc<AdmissionState>,
        collab: Collaborators,
    ) -> Self {
        info!(
            ?role,
            local_host = %settings.local_host,
            catalog_host = %settings.catalog_host,
            port = role.port(&settings),
            "Control executor created"
        );
        Self {
            role,
            settings,
            state,
            collab,
        }
    }

    /// Build an executor with the default collaborators.
    ///
    /// Fails when the control-plane configuration is incomplete; the
    /// executor never starts in that case.
    pub fn from_config(
        role: ExecutorRole,
        config: &GridConfig,
        state: Arc<AdmissionState>,
    ) -> Result<Self> {
        let settings = ControlSettings::resolve(config).inspect_err(|e| {
            error!(error = %e, "Control plane configuration is incomplete");
        })?;
        let collab = Collaborators::from_config(config, &settings);
        Ok(Self::new(role, settings, state, collab))
    }

    pub fn role(&self) -> ExecutorRole {
        self.role
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn state(&self) -> &Arc<AdmissionState> {
        &self.state
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Port this executor listens on and forwards generic dispatch to.
    pub fn port(&self) -> u16 {
        self.role.port(&self.settings)
    }

    /// Receive loop: answer every request until the state is terminal.
    pub async fn serve(&self, listener: ControlListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "Control plane listening");

        while !self.state.get().is_terminal() {
            let inbound = match listener.recv(self.settings.polling_interval).await {
                Ok(Some(inbound)) => inbound,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "Failed to receive control request");
                    continue;
                }
            };

            let peer = inbound.peer();
            let reply = self.handle_payload(inbound.payload()).await;
            let sealed = seal_reply(&self.settings.secret, &reply).unwrap_or_else(|e| {
                error!(error = %e, "Failed to encrypt control reply");
                Vec::new()
            });

            if let Err(e) = inbound.reply(&sealed).await {
                warn!(%peer, error = %e, "Failed to send control reply");
            }
        }

        info!(state = %self.state.get(), "Control plane exiting");
        Ok(())
    }

    /// Turn one sealed request into reply text.
    ///
    /// Always produces a reply: output fragments, a `[-]` error, the paused
    /// sentinel or the success sentinel.
    pub async fn handle_payload(&self, payload: &[u8]) -> String {
        let request = match open_request(&self.settings.secret, payload) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Rejected control request");
                return format!("{} {}", ERROR_MARKER, e);
            }
        };
        self.handle_request(&request).await
    }

    /// Turn one decoded request into reply text.
    pub async fn handle_request(&self, request: &ControlRequest) -> String {
        if self.state.get() == ServerState::Paused && request.command != ControlCommand::Resume {
            info!(command = %request.command, "Server is paused, rejecting command");
            return PAUSED_SENTINEL.to_string();
        }

        let mut output = String::new();
        let result = self.process(request, &mut output).await;

        if !output.is_empty() {
            output
        } else if let Err(e) = result {
            format!("{} {}", ERROR_MARKER, e)
        } else {
            SUCCESS_SENTINEL.to_string()
        }
    }

    /// Run a request past admission: notifications, validation and dispatch.
    ///
    /// Output fragments accumulate in `output`. Per-host failures do not stop
    /// processing; the last one is returned.
    pub async fn process(&self, request: &ControlRequest, output: &mut String) -> Result<()> {
        let local = self.settings.local_host.as_str();
        let catalog = self.settings.catalog_host.as_str();
        let mut last_error: Option<Error> = None;

        if request.command == ControlCommand::Resume {
            self.notify_catalog_then_local(request, output, &mut last_error)
                .await;
        }

        // An unreachable catalog leaves membership empty; local and catalog
        // notifications below still run.
        let membership = match self.collab.catalog.resource_hosts().await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!(error = %e, "Failed to query grid membership");
                last_error = Some(e);
                Vec::new()
            }
        };

        let targets: Vec<String> = match &request.target {
            TargetSelector::All => membership.clone(),
            TargetSelector::Hosts(hosts) => hosts.clone(),
        };

        let dispatch = self.validate_hosts(&targets, &membership, output, &mut last_error);
        debug!(command = %request.command, hosts = ?dispatch, "Dispatching");

        for host in &dispatch {
            let result = if compare_host_names(host, local) {
                self.run_local(request, output).await
            } else {
                self.collab
                    .forwarder
                    .forward(host, self.port(), &request.retarget(host), output)
                    .await
            };
            if let Err(e) = result {
                warn!(host = %host, error = %e, "Control command failed for host");
                last_error = Some(e);
            }
        }

        if request.command != ControlCommand::Resume {
            if is_targeted(&request.target, local) && !compare_host_names(local, catalog) {
                if let Err(e) = self.run_local(request, output).await {
                    last_error = Some(e);
                }
            }
            if is_targeted(&request.target, catalog) {
                if let Err(e) = self.contact_catalog(request, output).await {
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resume pre-op: the catalog provider first, then the local host.
    async fn notify_catalog_then_local(
        &self,
        request: &ControlRequest,
        output: &mut String,
        last_error: &mut Option<Error>,
    ) {
        let local = self.settings.local_host.as_str();
        let catalog = self.settings.catalog_host.as_str();
        if is_targeted(&request.target, catalog) {
            if let Err(e) = self.contact_catalog(request, output).await {
                *last_error = Some(e);
            }
            tokio::time::sleep(self.settings.forward_sleep).await;
        }

        if is_targeted(&request.target, local) && !compare_host_names(local, catalog) {
            if let Err(e) = self.run_local(request, output).await {
                *last_error = Some(e);
            }
        }
    }

    /// Run the command on the catalog provider, in-process if that is us.
    async fn contact_catalog(&self, request: &ControlRequest, output: &mut String) -> Result<()> {
        let catalog = self.settings.catalog_host.as_str();
        if compare_host_names(&self.settings.local_host, catalog) {
            self.run_local(request, output).await
        } else {
            self.collab
                .forwarder
                .forward(catalog, self.settings.port, &request.retarget(catalog), output)
                .await
        }
    }

    /// Check every requested host against membership.
    ///
    /// Returns the hosts left for generic dispatch: valid members other than
    /// the local and catalog-provider hosts. Unknown hosts each get an
    /// `invalid_server_hostname` fragment.
    fn validate_hosts(
        &self,
        targets: &[String],
        membership: &[String],
        output: &mut String,
        last_error: &mut Option<Error>,
    ) -> Vec<String> {
        let local = self.settings.local_host.as_str();
        let catalog = self.settings.catalog_host.as_str();
        let mut dispatch = Vec::new();

        for host in targets {
            if host == LOCALHOST
                || compare_host_names(host, local)
                || compare_host_names(host, catalog)
            {
                continue;
            }

            if !is_host_in_list(host, membership) {
                warn!(host = %host, "Invalid server hostname");
                output.push_str(&format_fragment(&json!({ "invalid_server_hostname": host })));
                *last_error = Some(Error::InvalidHost { host: host.clone() });
                continue;
            }

            if !dispatch.contains(host) {
                dispatch.push(host.clone());
            }
        }

        dispatch
    }
}

/// Whether `host` is selected by `target`.
fn is_targeted(target: &TargetSelector, host: &str) -> bool {
    match target {
        TargetSelector::All => true,
        TargetSelector::Hosts(hosts) => is_host_in_list(host, hosts),
    }
}
