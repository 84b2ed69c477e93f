//! gridctl server binary entry point.
//!
//! Runs one control plane and stands in for the accept loop: it watches the
//! admission state and exits once a shutdown has stopped the server.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use gridctl_core::{GridConfig, Result};
use gridctl_server::{AdmissionState, Cli, ControlExecutor, ControlPlane, ServerState};

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_format = cli.log_format.into();
    if let Err(e) = gridctl_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // Log startup
    info!(version = env!("CARGO_PKG_VERSION"), "gridctl-server starting");

    if let Err(e) = run(&cli) {
        error!(error = %e, "Server failed");
        eprintln!("gridctl-server: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let path = GridConfig::resolve_path(cli.config.as_deref());
    let config = GridConfig::load(&path)?;

    let state = Arc::new(AdmissionState::new());
    let executor = ControlExecutor::from_config(cli.role.into(), &config, Arc::clone(&state))?;
    let interval = executor.settings().polling_interval;

    let plane = ControlPlane::start(executor)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if state.get() == ServerState::Stopped || plane.is_finished() {
                        break;
                    }
                }
            }
        }
    });

    state.deinit();
    plane.join()?;
    info!("gridctl-server exited");
    Ok(())
}
