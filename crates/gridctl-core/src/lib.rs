//! gridctl-core: Shared library for the grid control plane.
//!
//! This crate provides:
//! - Error types shared by every gridctl crate
//! - Logging setup (tracing)
//! - Protocol and timing constants
//! - Grid configuration loading and control-plane settings
//! - The symmetric crypto engine wrapping every control message
//! - Fuzzy hostname comparison used for host ordering and validation

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod hostname;
pub mod logging;

pub use config::{ControlSettings, GridConfig};
pub use crypto::{BufferCrypt, CipherAlgorithm, CryptError, SharedSecret};
pub use error::{Error, Result};
pub use hostname::{compare_host_names, is_host_in_list};
pub use logging::{LogFormat, init_logging};
