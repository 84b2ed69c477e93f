//! Aggregated reply fragments.
//!
//! An executor answers with the concatenation of per-host JSON fragments,
//! each a pretty-printed object followed by `,\n`. Readers wrap the text in
//! `[...]` after trimming the dangling comma.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

use gridctl_core::constants::{ERROR_MARKER, PAUSED_SENTINEL, SUCCESS_SENTINEL};
use gridctl_core::{Error, Result};

/// Render one reply fragment: 4-space pretty JSON plus `,\n`.
pub fn format_fragment(value: &Value) -> String {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    // Serializing a Value into a Vec cannot fail.
    let _ = value.serialize(&mut ser);
    let mut text = String::from_utf8_lossy(&out).into_owned();
    text.push_str(",\n");
    text
}

/// A decrypted reply, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedReply {
    /// The success sentinel: nothing to show.
    Success,
    /// The target server is paused.
    Paused,
    /// A whole-request error (`[-] ...`).
    Error(String),
    /// Per-host fragments, in reply order.
    Fragments(Vec<Value>),
}

impl AggregatedReply {
    /// Classify and parse reply text.
    ///
    /// Fails with [`Error::Codec`] when fragment text is not well-formed JSON.
    pub fn parse(text: &str) -> Result<Self> {
        if text == SUCCESS_SENTINEL {
            return Ok(AggregatedReply::Success);
        }
        if text == PAUSED_SENTINEL {
            return Ok(AggregatedReply::Paused);
        }
        if text.starts_with(ERROR_MARKER) {
            return Ok(AggregatedReply::Error(text.to_string()));
        }

        let body = text.trim_end().trim_end_matches(',');
        let wrapped = format!("[{}]", body);
        let fragments: Vec<Value> = serde_json::from_str(&wrapped).map_err(|e| Error::Codec {
            message: format!("malformed reply fragments: {}", e),
        })?;
        Ok(AggregatedReply::Fragments(fragments))
    }

    /// Pretty-printed JSON array of the fragments.
    pub fn to_pretty_json(&self) -> Option<String> {
        match self {
            AggregatedReply::Fragments(fragments) => {
                let mut out = Vec::new();
                let mut ser =
                    Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
                fragments.serialize(&mut ser).ok()?;
                String::from_utf8(out).ok()
            }
            _ => None,
        }
    }
}
