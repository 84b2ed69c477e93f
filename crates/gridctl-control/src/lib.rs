//! Encrypted control protocol for gridctl.
//!
//! This crate provides the protocol layer shared by the server daemon (which
//! answers and forwards control requests) and the operator CLI (which issues
//! them).
//!
//! # Architecture
//!
//! - **Envelope**: the raw `{command, options}` record and its protobuf
//!   codec. See [`envelope`].
//! - **Types**: the typed request decoded once from an envelope. See [`types`].
//! - **Protocol**: sealing/opening requests and replies with the shared
//!   secret. See [`protocol`].
//! - **Channel**: TCP request/reply transport with timeouts. See [`channel`].
//! - **Client**: one-shot round trip used by the CLI. See [`client`].
//! - **Reply**: aggregated reply fragments. See [`reply`].
//!
//! # Wire Format
//!
//! Each connection carries one request frame and one reply frame:
//! - 4 bytes: u32 little-endian length prefix
//! - N bytes: ciphertext
//!
//! A request ciphertext decrypts to a protobuf `CommandEnvelope`; a reply
//! ciphertext decrypts to UTF-8 reply text.

pub mod channel;
pub mod client;
pub mod envelope;
pub mod protocol;
pub mod reply;
pub mod types;

pub use channel::{
    ChannelError, ChannelResult, ControlListener, InboundRequest, encode_frame, request_reply,
    try_decode_frame,
};
pub use client::ControlClient;
pub use envelope::CommandEnvelope;
pub use protocol::{open_reply, open_request, seal_reply, seal_request};
pub use reply::{AggregatedReply, format_fragment};
pub use types::{ControlCommand, ControlRequest, TargetSelector, WaitPolicy};
