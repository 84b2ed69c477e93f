//! Process-wide admission state.
//!
//! State transitions:
//! ```text
//! Running <-> Paused -> Stopped -> Exited
//! ```
//!
//! The control executor is the only writer. The accept loop reads it to decide
//! whether to admit new client connections, and advances `Stopped` to
//! `Exited` at process end through [`AdmissionState::deinit`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use gridctl_core::{Error, Result};

/// Admission states of a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Running = 0,
    Paused = 1,
    Stopped = 2,
    Exited = 3,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Running => "server_state_running",
            ServerState::Paused => "server_state_paused",
            ServerState::Stopped => "server_state_stopped",
            ServerState::Exited => "server_state_exited",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerState::Running,
            1 => ServerState::Paused,
            2 => ServerState::Stopped,
            _ => ServerState::Exited,
        }
    }

    /// The only state a transition into `self` may start from.
    fn predecessor(&self) -> ServerState {
        match self {
            ServerState::Running => ServerState::Paused,
            ServerState::Paused => ServerState::Running,
            ServerState::Stopped => ServerState::Paused,
            ServerState::Exited => ServerState::Stopped,
        }
    }

    /// Check whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: ServerState) -> bool {
        next.predecessor() == *self
    }

    /// Stopped or exited: the control plane should stop receiving.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerState::Stopped | ServerState::Exited)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated admission state, shared by reference.
#[derive(Debug)]
pub struct AdmissionState {
    state: AtomicU8,
}

impl AdmissionState {
    /// Create the state at process start (`Running`).
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServerState::Running as u8),
        }
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next`.
    ///
    /// A transition into the current state is a no-op. Any other transition
    /// not in the state diagram fails with [`Error::InvalidState`].
    pub fn transition(&self, next: ServerState) -> Result<()> {
        let current = self.get();
        if current == next {
            return Ok(());
        }

        let expected = next.predecessor();
        self.state
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| Error::InvalidState {
                expected: expected.to_string(),
                actual: ServerState::from_u8(actual).to_string(),
            })?;

        info!(from = %current, to = %next, "Admission state changed");
        Ok(())
    }

    /// Mark the process as exited (process end).
    pub fn deinit(&self) {
        self.state
            .store(ServerState::Exited as u8, Ordering::Release);
    }

    /// Whether the accept loop may admit new client connections.
    pub fn accepts_connections(&self) -> bool {
        self.get() == ServerState::Running
    }
}

impl Default for AdmissionState {
    fn default() -> Self {
        Self::new()
    }
}
