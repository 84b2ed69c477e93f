//! Sealed request/reply codec.
//!
//! Requests travel as `encrypt(secret, iv, encode(envelope))`, replies as the
//! encrypted UTF-8 reply text. Both sides build a fresh cipher from the
//! [`SharedSecret`] per message.

use gridctl_core::{Error, Result, SharedSecret};

use crate::envelope::CommandEnvelope;
use crate::types::ControlRequest;

/// Encode and encrypt a request.
pub fn seal_request(secret: &SharedSecret, request: &ControlRequest) -> Result<Vec<u8>> {
    let plaintext = request.to_envelope().encode_to_bytes();
    Ok(secret.seal(&plaintext)?)
}

/// Decrypt and decode a request.
///
/// A decrypt failure surfaces as [`Error::Crypto`], a malformed envelope as
/// [`Error::Codec`], an invalid command or selector as [`Error::Protocol`].
pub fn open_request(secret: &SharedSecret, ciphertext: &[u8]) -> Result<ControlRequest> {
    let plaintext = secret.open(ciphertext)?;
    let envelope = CommandEnvelope::decode_from(&plaintext)?;
    ControlRequest::from_envelope(&envelope)
}

/// Encrypt a reply.
pub fn seal_reply(secret: &SharedSecret, reply: &str) -> Result<Vec<u8>> {
    Ok(secret.seal(reply.as_bytes())?)
}

/// Decrypt a reply.
pub fn open_reply(secret: &SharedSecret, ciphertext: &[u8]) -> Result<String> {
    let plaintext = secret.open(ciphertext)?;
    String::from_utf8(plaintext).map_err(|e| Error::Codec {
        message: format!("reply is not valid UTF-8: {}", e),
    })
}
