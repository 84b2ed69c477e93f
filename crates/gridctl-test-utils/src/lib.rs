//! gridctl-test-utils: Test infrastructure for gridctl.
//!
//! Provides:
//! - RecordingForwarder: records forwards instead of using the network
//! - FakeCatalog: fixed or failing grid membership
//! - FakeAgents: agent monitor that drains (or not) on demand
//! - RecordingTerminator: records companion terminations
//! - Shared test secret, settings and configuration

mod fakes;
mod recording_forwarder;
mod settings;

pub use fakes::{FakeAgents, FakeCatalog, RecordingTerminator};
pub use recording_forwarder::{ForwardCall, RecordingForwarder};
pub use settings::{TEST_KEY, test_config_json, test_secret, test_settings};
