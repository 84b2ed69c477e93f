//! End-to-end grid test: two control planes talking over loopback TCP.

use std::collections::{BTreeMap, BTreeSet};
use std::net::TcpListener;
use std::sync::Arc;

use gridctl_control::{
    AggregatedReply, ControlClient, ControlCommand, ControlRequest, TargetSelector, WaitPolicy,
};
use gridctl_core::constants::PAUSED_SENTINEL;
use gridctl_server::{
    AdmissionState, AgentTable, Collaborators, CompanionTable, ControlExecutor, ControlPlane,
    ExecutorRole, ServerState, StaticCatalog, TcpForwarder,
};
use gridctl_test_utils::{RecordingTerminator, test_secret, test_settings};

struct Node {
    plane: ControlPlane,
    state: Arc<AdmissionState>,
    client: ControlClient,
}

/// Start the grid {alpha (catalog provider), beta} on ephemeral ports.
fn start_grid() -> (Node, Node) {
    let alpha_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let beta_listener = TcpListener::bind("127.0.0.1:0").unwrap();

    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        "alpha".to_string(),
        alpha_listener.local_addr().unwrap().to_string(),
    );
    endpoints.insert(
        "beta".to_string(),
        beta_listener.local_addr().unwrap().to_string(),
    );

    let start = |local: &str, listener: TcpListener| {
        let settings = test_settings(local, "alpha");
        let state = Arc::new(AdmissionState::new());
        let collab = Collaborators {
            catalog: Arc::new(StaticCatalog::new(["alpha".to_string(), "beta".to_string()])),
            forwarder: Arc::new(
                TcpForwarder::new(test_secret(), settings.timeout).with_endpoints(endpoints.clone()),
            ),
            agents: Arc::new(AgentTable::new()),
            processes: Arc::new(RecordingTerminator::new()),
            companions: Arc::new(CompanionTable::default()),
        };
        let client = ControlClient::new(test_secret(), endpoints[local].clone(), settings.timeout);
        let executor = ControlExecutor::new(ExecutorRole::Server, settings, state.clone(), collab);
        let plane = ControlPlane::start_on(executor, listener).unwrap();
        Node {
            plane,
            state,
            client,
        }
    };

    (start("alpha", alpha_listener), start("beta", beta_listener))
}

fn hostnames(reply: &str) -> BTreeSet<String> {
    match AggregatedReply::parse(reply).unwrap() {
        AggregatedReply::Fragments(fragments) => fragments
            .iter()
            .filter_map(|f| f["hostname"].as_str().map(String::from))
            .collect(),
        other => panic!("expected fragments, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn grid_lifecycle_over_tcp() {
    let (alpha, beta) = start_grid();
    let expected: BTreeSet<String> = ["alpha", "beta"].iter().map(|s| s.to_string()).collect();

    // status --all through a non-catalog host reaches both hosts
    let reply = beta
        .client
        .send(&ControlRequest::new(ControlCommand::Status, TargetSelector::All))
        .await
        .unwrap();
    assert_eq!(hostnames(&reply), expected);

    // pause --all pauses both hosts
    beta.client
        .send(&ControlRequest::new(ControlCommand::Pause, TargetSelector::All))
        .await
        .unwrap();
    assert_eq!(alpha.state.get(), ServerState::Paused);
    assert_eq!(beta.state.get(), ServerState::Paused);

    let reply = beta
        .client
        .send(&ControlRequest::new(ControlCommand::Status, TargetSelector::All))
        .await
        .unwrap();
    assert_eq!(reply, PAUSED_SENTINEL);

    // resume --all resumes the catalog provider first, then beta
    let reply = beta
        .client
        .send(&ControlRequest::new(ControlCommand::Resume, TargetSelector::All))
        .await
        .unwrap();
    let alpha_at = reply.find("\"resuming\": \"alpha\"").unwrap();
    let beta_at = reply.find("\"resuming\": \"beta\"").unwrap();
    assert!(alpha_at < beta_at);
    assert_eq!(alpha.state.get(), ServerState::Running);
    assert_eq!(beta.state.get(), ServerState::Running);

    // an unknown host is reported without aborting the rest
    let reply = alpha
        .client
        .send(&ControlRequest::new(
            ControlCommand::Ping,
            TargetSelector::Hosts(vec!["nowhere".into(), "beta".into()]),
        ))
        .await
        .unwrap();
    assert!(reply.contains("\"invalid_server_hostname\": \"nowhere\""));
    assert!(reply.contains("\"status\": \"alive\""));

    // shutdown --all stops both control planes
    let reply = beta
        .client
        .send(
            &ControlRequest::new(ControlCommand::Shutdown, TargetSelector::All)
                .with_wait(WaitPolicy::ForceAfter(0)),
        )
        .await
        .unwrap();
    assert!(reply.contains("\"shutting down\": \"beta\""));
    assert!(reply.contains("\"shutting down\": \"alpha\""));
    assert_eq!(alpha.state.get(), ServerState::Stopped);
    assert_eq!(beta.state.get(), ServerState::Stopped);

    tokio::task::spawn_blocking(move || {
        alpha.plane.join().unwrap();
        beta.plane.join().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_key_gets_no_usable_reply() {
    let (alpha, _beta) = start_grid();
    let intruder = ControlClient::new(
        gridctl_core::SharedSecret::new(&b"another_key_of_thirty_two_bytes!"[..], "AES-256-CBC", 16),
        alpha.plane.local_addr().to_string(),
        std::time::Duration::from_secs(1),
    );

    // The server cannot open the request; its "[-]" reply is sealed with the
    // grid key, so the intruder cannot read it either.
    let result = intruder
        .send(&ControlRequest::new(ControlCommand::Pause, TargetSelector::All))
        .await;
    match result {
        Ok(text) => assert!(!text.contains("pausing")),
        Err(_) => {}
    }
    assert_eq!(alpha.state.get(), ServerState::Running);
}
