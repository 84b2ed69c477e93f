//! Command envelope and its schema codec.
//!
//! The envelope is the raw record carried inside every sealed request:
//!
//! ```text
//! message CommandEnvelope {
//!     string command = 1;
//!     map<string, string> options = 2;
//! }
//! ```
//!
//! It is encoded with protobuf. Decoding fails cleanly on malformed input.
//! The typed view of an envelope is [`crate::types::ControlRequest`].

use std::collections::BTreeMap;

use prost::Message as ProstMessage;

use gridctl_core::{Error, Result};

/// Raw control command record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandEnvelope {
    #[prost(string, tag = "1")]
    pub command: String,

    #[prost(btree_map = "string, string", tag = "2")]
    pub options: BTreeMap<String, String>,
}

impl CommandEnvelope {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: BTreeMap::new(),
        }
    }

    /// Add an option entry (builder style).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Encode to protobuf bytes.
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode from protobuf bytes.
    pub fn decode_from(bytes: &[u8]) -> Result<Self> {
        Self::decode(bytes).map_err(|e| Error::Codec {
            message: format!("envelope decode failed: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_with_options() {
        let envelope = CommandEnvelope::new("pause")
            .with_option("server_control_option", "hosts")
            .with_option("server_control_host_0", "alpha");

        let bytes = envelope.encode_to_bytes();
        let decoded = CommandEnvelope::decode_from(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn empty_envelope_roundtrips() {
        let envelope = CommandEnvelope::default();
        let decoded = CommandEnvelope::decode_from(&envelope.encode_to_bytes()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn malformed_input_is_codec_error() {
        // Field 1, length-delimited, claims 100 bytes but provides 2
        let err = CommandEnvelope::decode_from(&[0x0a, 0x64, b'h', b'i']).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }

    proptest! {
        #[test]
        fn prop_envelope_roundtrip(
            command in "[a-z_]{0,16}",
            options in proptest::collection::btree_map("[a-z_0-9]{1,32}", ".{0,32}", 0..8),
        ) {
            let envelope = CommandEnvelope { command, options };
            let decoded = CommandEnvelope::decode_from(&envelope.encode_to_bytes()).unwrap();
            prop_assert_eq!(decoded, envelope);
        }
    }
}
