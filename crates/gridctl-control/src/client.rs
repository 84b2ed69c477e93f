//! One-shot control client.
//!
//! Builds one sealed request, performs one round trip against a server's
//! control endpoint and returns the decrypted reply text.

use std::time::Duration;

use tracing::debug;

use gridctl_core::constants::LOCALHOST;
use gridctl_core::{ControlSettings, Error, GridConfig, Result, SharedSecret};

use crate::channel::request_reply;
use crate::protocol::{open_reply, seal_request};
use crate::types::ControlRequest;

/// Client for a single control endpoint.
#[derive(Debug, Clone)]
pub struct ControlClient {
    secret: SharedSecret,
    endpoint: String,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(secret: SharedSecret, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            secret,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Client for the local server's control endpoint.
    ///
    /// Honors an `endpoints` override for the local host, else
    /// `localhost:<port>`.
    pub fn local(config: &GridConfig, settings: &ControlSettings) -> Self {
        let endpoint = config
            .endpoints
            .get(&settings.local_host)
            .cloned()
            .unwrap_or_else(|| format!("{}:{}", LOCALHOST, settings.port));
        Self::new(settings.secret.clone(), endpoint, settings.timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and return the decrypted reply.
    pub async fn send(&self, request: &ControlRequest) -> Result<String> {
        debug!(
            endpoint = %self.endpoint,
            command = %request.command,
            "Sending control request"
        );

        let sealed = seal_request(&self.secret, request)?;
        let reply = request_reply(&self.endpoint, &sealed, self.timeout).await?;
        if reply.is_empty() {
            return Err(Error::Transport {
                message: format!("empty reply from {}", self.endpoint),
            });
        }
        open_reply(&self.secret, &reply)
    }
}
