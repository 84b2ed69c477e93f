//! gridctl-server: control plane daemon for one grid host.
//!
//! This crate provides:
//! - The process-wide admission state read by the accept loop
//! - Collaborator seams (catalog, forwarding, agents, processes)
//! - The control executor and its command handlers
//! - The control plane thread running an executor's receive loop

pub mod admission;
pub mod cli;
pub mod collaborators;
pub mod executor;
mod handlers;
pub mod plane;

pub use admission::{AdmissionState, ServerState};
pub use cli::Cli;
pub use collaborators::{
    AgentInfo, AgentMonitor, AgentTable, Catalog, Collaborators, CompanionTable, Forwarder,
    ProcessControl, SignalProcessControl, StaticCatalog, TcpForwarder,
};
pub use executor::{ControlExecutor, ExecutorRole};
pub use plane::ControlPlane;
