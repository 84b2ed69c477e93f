//! Runs the gridctl binary against a live single-host grid on loopback.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use gridctl_core::GridConfig;
use gridctl_core::constants::PAUSED_SENTINEL;
use gridctl_server::{AdmissionState, ControlExecutor, ControlPlane, ExecutorRole, ServerState};
use gridctl_test_utils::test_config_json;

/// Write a config for host "alpha" whose control endpoint is `addr`.
fn write_config(dir: &Path, addr: &str) -> std::path::PathBuf {
    let mut config: serde_json::Value =
        serde_json::from_str(&test_config_json("alpha", "alpha", &["alpha"])).unwrap();
    config["endpoints"] = serde_json::json!({ "alpha": addr });

    let path = dir.join("grid.json");
    std::fs::write(&path, config.to_string()).unwrap();
    path
}

fn gridctl(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gridctl"))
        .args(args)
        .arg("--config")
        .arg(config)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn operator_session_against_one_host() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let config_path = write_config(dir.path(), &listener.local_addr().unwrap().to_string());

    let config = GridConfig::load(&config_path).unwrap();
    let state = Arc::new(AdmissionState::new());
    let executor = ControlExecutor::from_config(ExecutorRole::Server, &config, state.clone()).unwrap();
    let plane = ControlPlane::start_on(executor, listener).unwrap();

    let out = gridctl(&config_path, &["ping", "--all"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.trim_start().starts_with('['), "not an array: {}", text);
    assert!(text.contains("\"status\": \"alive\""));

    let out = gridctl(&config_path, &["status", "--hosts=alpha"]);
    let text = stdout(&out);
    assert!(text.contains("\"hostname\": \"alpha\""));
    assert!(text.contains("\"server_pid\""));
    assert!(text.contains("\"status\": \"server_state_running\""));
    assert!(text.contains("\"agents\": []"));

    gridctl(&config_path, &["pause", "--all"]);
    assert_eq!(state.get(), ServerState::Paused);

    let out = gridctl(&config_path, &["status", "--all"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim_end(), PAUSED_SENTINEL);

    gridctl(&config_path, &["resume", "--all"]);
    assert_eq!(state.get(), ServerState::Running);

    let out = gridctl(&config_path, &["shutdown", "--all", "--force-after=0"]);
    assert!(stdout(&out).contains("\"shutting down\": \"alpha\""));
    assert_eq!(state.get(), ServerState::Stopped);

    plane.join().unwrap();
}
