//! Protocol and configuration constants for the grid control plane.

use std::time::Duration;

// =============================================================================
// Envelope Option Keys
// =============================================================================

/// Option key carrying the target selector.
pub const OPTION_KW: &str = "server_control_option";

/// Selector value: every host in the grid.
pub const ALL_OPT: &str = "all";

/// Selector value: an explicit host list.
pub const HOSTS_OPT: &str = "hosts";

/// Prefix of the (numbered) host entry keys.
pub const HOST_KW: &str = "server_control_host";

/// Wait-policy key: give up draining after N seconds.
pub const FORCE_AFTER_KW: &str = "server_control_force_after";

/// Wait-policy key: drain without a deadline.
pub const WAIT_FOREVER_KW: &str = "server_control_wait_forever";

// =============================================================================
// Reply Sentinels
// =============================================================================

/// Reply sent when a command succeeded and produced no output.
pub const SUCCESS_SENTINEL: &str = "server_control_success";

/// Reply sent when the server is paused and the command is not `resume`.
pub const PAUSED_SENTINEL: &str = "The server is Paused, resume before issuing any other commands";

/// Prefix marking a reply as a whole-request error.
pub const ERROR_MARKER: &str = "[-]";

/// Hostname the catalog may report but which never identifies a grid member.
pub const LOCALHOST: &str = "localhost";

// =============================================================================
// Framing Constants
// =============================================================================

/// Length of the frame header (4 bytes, little-endian u32).
pub const FRAME_HEADER_LEN: usize = 4;

/// Maximum control frame payload (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

// =============================================================================
// Timing Constants
// =============================================================================

/// Default send/receive timeout for forwarded control calls.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Interval between admission/drain checks.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Pause after notifying the catalog provider during resume.
pub const DEFAULT_FORWARD_SLEEP: Duration = Duration::from_millis(500);

// =============================================================================
// Port Defaults
// =============================================================================

/// Default control plane port of the main server.
pub const DEFAULT_CONTROL_PLANE_PORT: u16 = 1248;

/// Default control plane port of the rule engine server.
pub const DEFAULT_RULE_ENGINE_PORT: u16 = 1262;

// =============================================================================
// Crypto Defaults
// =============================================================================

/// Default symmetric key size in bytes.
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Default salt size in bytes.
pub const DEFAULT_SALT_SIZE: usize = 8;

/// Default number of hash rounds.
pub const DEFAULT_HASH_ROUNDS: usize = 16;

/// Default cipher name.
pub const DEFAULT_ALGORITHM: &str = "AES-256-CBC";

/// Cipher block size (AES) and therefore IV length in bytes.
pub const CIPHER_BLOCK_SIZE: usize = 16;

// =============================================================================
// Configuration
// =============================================================================

/// Environment variable naming the grid configuration file.
pub const CONFIG_ENV: &str = "GRIDCTL_CONFIG";

/// Fallback location of the grid configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gridctl/server_config.json";
