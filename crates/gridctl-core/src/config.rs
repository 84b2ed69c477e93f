//! Grid configuration.
//!
//! A single JSON document shared by the server daemon and the operator CLI.
//! Every field deserializes with a default so a partial file still loads;
//! the values the control plane cannot run without are checked once by
//! [`ControlSettings::resolve`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::constants::{
    CONFIG_ENV, DEFAULT_CONFIG_PATH, DEFAULT_CONTROL_PLANE_PORT, DEFAULT_CONTROL_TIMEOUT,
    DEFAULT_FORWARD_SLEEP, DEFAULT_POLLING_INTERVAL, DEFAULT_RULE_ENGINE_PORT, LOCALHOST,
};
use crate::crypto::SharedSecret;
use crate::{Error, Result};

/// Top-level grid configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Name of this host; the OS hostname when absent.
    pub hostname: Option<String>,

    /// Catalog-provider hosts; the first entry is authoritative.
    pub catalog_provider_hosts: Vec<String>,

    /// Resource hosts backing the static catalog.
    pub resource_hosts: Vec<String>,

    pub control_plane: ControlPlaneConfig,

    /// Companion process name to stored pid (`null` when not running).
    pub companions: BTreeMap<String, Option<i32>>,

    /// Per-host `host:port` overrides for reaching a peer's control endpoint.
    pub endpoints: BTreeMap<String, String>,
}

/// `control_plane` section of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub key: Option<String>,
    pub encryption_algorithm: Option<String>,
    pub num_hash_rounds: Option<usize>,
    pub port: u16,
    pub rule_engine_port: u16,
    pub timeout_milliseconds: u64,
    pub polling_interval_milliseconds: u64,
    pub forward_sleep_milliseconds: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            key: None,
            encryption_algorithm: None,
            num_hash_rounds: None,
            port: DEFAULT_CONTROL_PLANE_PORT,
            rule_engine_port: DEFAULT_RULE_ENGINE_PORT,
            timeout_milliseconds: DEFAULT_CONTROL_TIMEOUT.as_millis() as u64,
            polling_interval_milliseconds: DEFAULT_POLLING_INTERVAL.as_millis() as u64,
            forward_sleep_milliseconds: DEFAULT_FORWARD_SLEEP.as_millis() as u64,
        }
    }
}

impl GridConfig {
    /// Load the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let config = Self::from_json(&text).map_err(|e| Error::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        debug!(path = %path.display(), "Loaded grid configuration");
        Ok(config)
    }

    /// Parse the configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration: {}", e),
        })
    }

    /// Pick the configuration path: explicit, then `$GRIDCTL_CONFIG`, then the default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Name of this host: the configured one, or the OS hostname.
    pub fn local_host(&self) -> Result<String> {
        if let Some(name) = self.hostname.as_deref().filter(|h| !h.is_empty()) {
            return Ok(name.to_string());
        }
        let name = nix::unistd::gethostname().map_err(|e| Error::Config {
            message: format!("failed to get local hostname: {}", e),
        })?;
        Ok(name.to_string_lossy().into_owned())
    }
}

/// Control-plane settings every executor needs, validated once.
#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub secret: SharedSecret,
    pub port: u16,
    pub rule_engine_port: u16,
    pub timeout: Duration,
    pub polling_interval: Duration,
    pub forward_sleep: Duration,
    pub local_host: String,
    pub catalog_host: String,
}

impl ControlSettings {
    /// Validate and extract the control-plane settings.
    ///
    /// Fails with [`Error::Config`] when the key, algorithm, port or hash
    /// round count is missing, or no catalog provider is configured.
    pub fn resolve(config: &GridConfig) -> Result<Self> {
        let cp = &config.control_plane;

        let key = cp
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing("control_plane.key"))?;
        let algorithm = cp
            .encryption_algorithm
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| missing("control_plane.encryption_algorithm"))?;
        let num_hash_rounds = cp
            .num_hash_rounds
            .filter(|&n| n > 0)
            .ok_or_else(|| missing("control_plane.num_hash_rounds"))?;
        if cp.port == 0 {
            return Err(missing("control_plane.port"));
        }

        let local_host = config.local_host()?;
        let catalog_host = match config.catalog_provider_hosts.first() {
            Some(host) if host == LOCALHOST => {
                error!(
                    local_host = %local_host,
                    "Catalog provider host must not be localhost, using local hostname"
                );
                local_host.clone()
            }
            Some(host) => host.clone(),
            None => return Err(missing("catalog_provider_hosts")),
        };

        Ok(Self {
            secret: SharedSecret::new(key.as_bytes(), algorithm, num_hash_rounds),
            port: cp.port,
            rule_engine_port: cp.rule_engine_port,
            timeout: Duration::from_millis(cp.timeout_milliseconds),
            polling_interval: Duration::from_millis(cp.polling_interval_milliseconds),
            forward_sleep: Duration::from_millis(cp.forward_sleep_milliseconds),
            local_host,
            catalog_host,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::Config {
        message: format!("missing or empty {}", field),
    }
}
