//! Reply rendering.

use gridctl_control::AggregatedReply;

/// Text to print for a decrypted reply, if any.
///
/// The success sentinel prints nothing. Fragments become one pretty-printed
/// JSON array; text that does not parse is printed as received.
pub fn render_reply(text: &str) -> Option<String> {
    match AggregatedReply::parse(text) {
        Ok(AggregatedReply::Success) => None,
        Ok(AggregatedReply::Paused) | Ok(AggregatedReply::Error(_)) => Some(text.to_string()),
        Ok(reply @ AggregatedReply::Fragments(_)) => {
            Some(reply.to_pretty_json().unwrap_or_else(|| text.to_string()))
        }
        Err(_) => Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridctl_core::constants::{PAUSED_SENTINEL, SUCCESS_SENTINEL};

    #[test]
    fn success_prints_nothing() {
        assert_eq!(render_reply(SUCCESS_SENTINEL), None);
    }

    #[test]
    fn paused_printed_verbatim() {
        assert_eq!(render_reply(PAUSED_SENTINEL).as_deref(), Some(PAUSED_SENTINEL));
    }

    #[test]
    fn fragments_become_one_array() {
        let text = "{\n    \"status\": \"alive\"\n},\n{\n    \"pausing\": \"beta\"\n},\n";
        let out = render_reply(text).unwrap();
        assert!(out.starts_with('['));
        assert!(out.trim_end().ends_with(']'));
        assert!(out.contains("\"status\": \"alive\""));
        assert!(out.contains("\"pausing\": \"beta\""));
        assert!(!out.contains("},\n]"));
    }

    #[test]
    fn garbage_printed_as_received() {
        assert_eq!(render_reply("not json,").as_deref(), Some("not json,"));
    }

    #[test]
    fn whole_request_error_printed() {
        let text = "[-] catalog error: catalog unavailable";
        assert_eq!(render_reply(text).as_deref(), Some(text));
    }
}
