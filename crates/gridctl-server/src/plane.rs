//! Control plane thread.
//!
//! Each executor runs its receive loop on a dedicated OS thread with its own
//! single-threaded tokio runtime, so command processing stays serialized and
//! independent of whatever runtime the rest of the process uses.

use std::net::{SocketAddr, TcpListener};
use std::thread::JoinHandle;

use tracing::{error, info};

use gridctl_control::ControlListener;
use gridctl_core::{Error, Result};

use crate::executor::ControlExecutor;

/// A running control plane.
pub struct ControlPlane {
    handle: Option<JoinHandle<Result<()>>>,
    local_addr: SocketAddr,
}

impl ControlPlane {
    /// Bind the executor's port on all interfaces and start serving.
    pub fn start(executor: ControlExecutor) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", executor.port()))?;
        Self::start_on(executor, listener)
    }

    /// Start serving on an already bound listener.
    pub fn start_on(executor: ControlExecutor, listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let timeout = executor.settings().timeout;

        let handle = std::thread::Builder::new()
            .name("control-plane".into())
            .spawn(move || -> Result<()> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                rt.block_on(async move {
                    let listener = ControlListener::from_std(listener, timeout)?;
                    executor.serve(listener).await
                })
            })?;

        info!(addr = %local_addr, "Control plane started");

        Ok(Self {
            handle: Some(handle),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the receive loop to finish.
    ///
    /// The loop ends once the admission state is stopped or exited.
    pub fn join(mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!("Control plane thread panicked");
                Err(Error::Process {
                    message: "control plane thread panicked".into(),
                })
            }
        }
    }

    /// Whether the receive loop has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}
