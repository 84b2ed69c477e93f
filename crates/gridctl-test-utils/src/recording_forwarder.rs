//! Forwarder that records calls instead of touching the network.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use gridctl_control::{ControlRequest, format_fragment};
use gridctl_core::{Error, Result};
use gridctl_server::Forwarder;

/// One recorded forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCall {
    pub host: String,
    pub port: u16,
    pub request: ControlRequest,
}

/// Records every forward and answers with a `forwarded_to` fragment.
///
/// Hosts marked unreachable get a `failed_to_connect` fragment and a
/// transport error, like a peer that is down.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    calls: Mutex<Vec<ForwardCall>>,
    unreachable: Mutex<HashSet<String>>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make forwards to `host` fail.
    pub fn set_unreachable(&self, host: &str) {
        self.unreachable.lock().unwrap().insert(host.to_string());
    }

    /// All forwards so far, in call order.
    pub fn calls(&self) -> Vec<ForwardCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Target hosts of all forwards so far, in call order.
    pub fn hosts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.host).collect()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(
        &self,
        host: &str,
        port: u16,
        request: &ControlRequest,
        output: &mut String,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(ForwardCall {
            host: host.to_string(),
            port,
            request: request.clone(),
        });

        if self.unreachable.lock().unwrap().contains(host) {
            let endpoint = format!("{}:{}", host, port);
            output.push_str(&format_fragment(&json!({ "failed_to_connect": endpoint })));
            return Err(Error::Transport {
                message: format!("failed to connect to {}", endpoint),
            });
        }

        output.push_str(&format_fragment(&json!({
            "forwarded_to": host,
            "command": request.command.as_str(),
        })));
        Ok(())
    }
}
