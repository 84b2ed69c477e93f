//! Shared secret and settings for tests.

use std::time::Duration;

use gridctl_core::{ControlSettings, SharedSecret};

/// Key shared by every test grid.
pub const TEST_KEY: &str = "32_byte_server_control_plane_key";

pub fn test_secret() -> SharedSecret {
    SharedSecret::new(TEST_KEY.as_bytes(), "AES-256-CBC", 16)
}

/// Settings with short timeouts for `local` in a grid whose catalog
/// provider is `catalog`.
pub fn test_settings(local: &str, catalog: &str) -> ControlSettings {
    ControlSettings {
        secret: test_secret(),
        port: 1248,
        rule_engine_port: 1262,
        timeout: Duration::from_millis(300),
        polling_interval: Duration::from_millis(10),
        forward_sleep: Duration::from_millis(10),
        local_host: local.to_string(),
        catalog_host: catalog.to_string(),
    }
}

/// A complete grid configuration document for `local`.
pub fn test_config_json(local: &str, catalog: &str, resource_hosts: &[&str]) -> String {
    serde_json::json!({
        "hostname": local,
        "catalog_provider_hosts": [catalog],
        "resource_hosts": resource_hosts,
        "control_plane": {
            "key": TEST_KEY,
            "encryption_algorithm": "AES-256-CBC",
            "num_hash_rounds": 16,
            "port": 1248,
            "timeout_milliseconds": 1000,
            "polling_interval_milliseconds": 10,
            "forward_sleep_milliseconds": 10
        }
    })
    .to_string()
}
