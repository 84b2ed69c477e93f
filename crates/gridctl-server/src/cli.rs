//! Server CLI implementation.
//!
//! Provides command-line argument parsing for the gridctl server daemon.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::executor::ExecutorRole;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for gridctl_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => gridctl_core::LogFormat::Text,
            CliLogFormat::Json => gridctl_core::LogFormat::Json,
        }
    }
}

/// Which control plane this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RoleArg {
    /// Main server (draining shutdown).
    #[default]
    Server,
    /// Rule engine server (immediate shutdown).
    RuleEngine,
}

impl From<RoleArg> for ExecutorRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Server => ExecutorRole::Server,
            RoleArg::RuleEngine => ExecutorRole::RuleEngine,
        }
    }
}

/// gridctl server - control plane daemon for one grid host.
#[derive(Debug, Parser)]
#[command(
    name = "gridctl-server",
    version,
    about = "gridctl server - control plane daemon for one grid host"
)]
pub struct Cli {
    /// Grid configuration file (default: $GRIDCTL_CONFIG, then /etc/gridctl/server_config.json)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Control plane to serve
    #[arg(long = "role", default_value = "server")]
    pub role: RoleArg,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}
