//! gridctl binary entry point.
//!
//! Usage and argument errors print usage text and still exit with status 0.

use clap::Parser;
use tracing::{debug, error};

use gridctl_cli::{Cli, render_reply};
use gridctl_control::ControlClient;
use gridctl_core::constants::ERROR_MARKER;
use gridctl_core::{ControlSettings, GridConfig, Result};

fn main() {
    // Parse CLI arguments
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };

    // Initialize logging
    let log_format = cli.log_format.into();
    if let Err(e) = gridctl_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match run(&cli) {
        Ok(Some(text)) => println!("{}", text),
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Control request failed");
            eprintln!("{} {}", ERROR_MARKER, e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<Option<String>> {
    let path = GridConfig::resolve_path(cli.config.as_deref());
    let config = GridConfig::load(&path)?;
    let settings = ControlSettings::resolve(&config)?;

    let client = ControlClient::local(&config, &settings);
    let request = cli.to_request();
    debug!(endpoint = client.endpoint(), command = %request.command, "Sending");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reply = rt.block_on(client.send(&request))?;

    Ok(render_reply(&reply))
}
