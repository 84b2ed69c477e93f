//! gridctl-cli: operator tool for the grid control plane.
//!
//! Sends exactly one control request to the local server and prints the
//! aggregated reply.

pub mod cli;
pub mod render;

pub use cli::Cli;
pub use render::render_reply;
