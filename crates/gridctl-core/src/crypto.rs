//! Symmetric crypto engine wrapping every control plane message.
//!
//! Every request and reply on the control plane is sealed with a grid-wide
//! shared secret:
//!
//! ```text
//! ciphertext = encrypt(secret, iv, encode(envelope))
//! ```
//!
//! A fresh [`BufferCrypt`] is built from the [`SharedSecret`] for every
//! message; no cipher state outlives a call.
//!
//! # Security note: fixed IV
//!
//! The control protocol encrypts with an **empty initialization vector** on
//! every message, which the engine expands to the all-zero block. With CBC
//! this means identical plaintext prefixes produce identical ciphertext
//! prefixes across the whole grid. This is a real weakness of the wire
//! protocol. It is kept because every peer in the grid must agree on it;
//! switching to [`BufferCrypt::initialization_vector`] requires a protocol
//! revision that carries the IV alongside the ciphertext.

use std::fmt;

use aws_lc_rs::cipher::{
    AES_128, AES_256, Algorithm, DecryptionContext, EncryptionContext, PaddedBlockDecryptingKey,
    PaddedBlockEncryptingKey, UnboundCipherKey,
};
use aws_lc_rs::error::Unspecified;
use aws_lc_rs::iv::FixedLength;
use thiserror::Error;
use tracing::warn;

use crate::constants::{
    CIPHER_BLOCK_SIZE, DEFAULT_ALGORITHM, DEFAULT_HASH_ROUNDS, DEFAULT_KEY_SIZE,
    DEFAULT_SALT_SIZE,
};

/// Errors raised by the cipher library.
///
/// aws-lc-rs deliberately reports failures as an opaque [`Unspecified`];
/// the failing operation is kept alongside it.
#[derive(Debug, Error)]
pub enum CryptError {
    /// Key material was rejected by the cipher.
    #[error("cipher key setup failed: {source}")]
    Key {
        #[source]
        source: Unspecified,
    },

    /// Encryption failed.
    #[error("encrypt failed: {source}")]
    Encrypt {
        #[source]
        source: Unspecified,
    },

    /// Decryption failed (wrong key, truncated input or bad padding).
    #[error("decrypt failed: {source}")]
    Decrypt {
        #[source]
        source: Unspecified,
    },

    /// The system random source failed.
    #[error("random source failed: {source}")]
    Random {
        #[source]
        source: Unspecified,
    },
}

impl CryptError {
    /// Name of the cipher operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            CryptError::Key { .. } => "key",
            CryptError::Encrypt { .. } => "encrypt",
            CryptError::Decrypt { .. } => "decrypt",
            CryptError::Random { .. } => "random",
        }
    }
}

/// Cipher selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-128 in CBC mode with PKCS#7 padding.
    Aes128Cbc,
    /// AES-256 in CBC mode with PKCS#7 padding.
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Look up a cipher by its OpenSSL-style name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AES-128-CBC" => Some(CipherAlgorithm::Aes128Cbc),
            "AES-256-CBC" => Some(CipherAlgorithm::Aes256Cbc),
            _ => None,
        }
    }

    /// Resolve a cipher name, falling back to AES-256-CBC with a warning.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(
                algorithm = name,
                fallback = DEFAULT_ALGORITHM,
                "Cipher algorithm not supported, using default"
            );
            CipherAlgorithm::Aes256Cbc
        })
    }

    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Cbc => 16,
            CipherAlgorithm::Aes256Cbc => 32,
        }
    }

    fn algorithm(&self) -> &'static Algorithm {
        match self {
            CipherAlgorithm::Aes128Cbc => &AES_128,
            CipherAlgorithm::Aes256Cbc => &AES_256,
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherAlgorithm::Aes128Cbc => write!(f, "AES-128-CBC"),
            CipherAlgorithm::Aes256Cbc => write!(f, "AES-256-CBC"),
        }
    }
}

/// Symmetric cipher wrapper.
///
/// Constructed per message; zero-valued sizes fall back to the defaults.
#[derive(Debug, Clone)]
pub struct BufferCrypt {
    key_size: usize,
    salt_size: usize,
    num_hash_rounds: usize,
    algorithm: CipherAlgorithm,
}

impl BufferCrypt {
    /// Create a cipher wrapper.
    ///
    /// `key_size`, `salt_size` and `num_hash_rounds` of zero select the
    /// defaults (32, 8, 16). An unknown `algorithm` logs a warning and
    /// selects AES-256-CBC.
    pub fn new(key_size: usize, salt_size: usize, num_hash_rounds: usize, algorithm: &str) -> Self {
        Self {
            key_size: if key_size == 0 { DEFAULT_KEY_SIZE } else { key_size },
            salt_size: if salt_size == 0 { DEFAULT_SALT_SIZE } else { salt_size },
            num_hash_rounds: if num_hash_rounds == 0 {
                DEFAULT_HASH_ROUNDS
            } else {
                num_hash_rounds
            },
            algorithm: CipherAlgorithm::resolve(algorithm),
        }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn salt_size(&self) -> usize {
        self.salt_size
    }

    pub fn num_hash_rounds(&self) -> usize {
        self.num_hash_rounds
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    /// Generate `size` cryptographically random bytes.
    pub fn generate_key(size: usize) -> Result<Vec<u8>, CryptError> {
        let mut key = vec![0u8; size];
        aws_lc_rs::rand::fill(&mut key).map_err(|source| CryptError::Random { source })?;
        Ok(key)
    }

    /// Generate a random block-sized initialization vector.
    pub fn initialization_vector(&self) -> Result<Vec<u8>, CryptError> {
        Self::generate_key(CIPHER_BLOCK_SIZE)
    }

    /// Render bytes as lowercase hex.
    pub fn hex_encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    /// Encrypt `plaintext` with `key` and `iv`.
    pub fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptError> {
        let unbound = self.unbound_key(key)?;
        let encrypting_key = PaddedBlockEncryptingKey::cbc_pkcs7(unbound)
            .map_err(|source| CryptError::Key { source })?;

        let mut in_out = plaintext.to_vec();
        let context = EncryptionContext::Iv128(FixedLength::from(block_iv(iv)));
        encrypting_key
            .less_safe_encrypt(&mut in_out, context)
            .map_err(|source| CryptError::Encrypt { source })?;

        Ok(in_out)
    }

    /// Decrypt `ciphertext` with `key` and `iv`.
    pub fn decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptError> {
        let unbound = self.unbound_key(key)?;
        let decrypting_key = PaddedBlockDecryptingKey::cbc_pkcs7(unbound)
            .map_err(|source| CryptError::Key { source })?;

        let mut in_out = ciphertext.to_vec();
        let context = DecryptionContext::Iv128(FixedLength::from(block_iv(iv)));
        let plaintext = decrypting_key
            .decrypt(&mut in_out, context)
            .map_err(|source| CryptError::Decrypt { source })?;

        Ok(plaintext.to_vec())
    }

    /// Fit the shared key to the cipher's key length (zero-padded or truncated).
    fn unbound_key(&self, key: &[u8]) -> Result<UnboundCipherKey, CryptError> {
        let mut fitted = vec![0u8; self.algorithm.key_len()];
        let n = key.len().min(fitted.len());
        fitted[..n].copy_from_slice(&key[..n]);
        UnboundCipherKey::new(self.algorithm.algorithm(), &fitted)
            .map_err(|source| CryptError::Key { source })
    }
}

/// Fit IV bytes to one cipher block; the empty IV becomes all zeros.
fn block_iv(iv: &[u8]) -> [u8; CIPHER_BLOCK_SIZE] {
    let mut block = [0u8; CIPHER_BLOCK_SIZE];
    let n = iv.len().min(CIPHER_BLOCK_SIZE);
    block[..n].copy_from_slice(&iv[..n]);
    block
}

/// Grid-wide shared secret used to seal control messages.
///
/// Loaded once at process start and read-only afterwards.
#[derive(Clone)]
pub struct SharedSecret {
    key: Vec<u8>,
    algorithm: String,
    num_hash_rounds: usize,
}

impl SharedSecret {
    pub fn new(key: impl Into<Vec<u8>>, algorithm: impl Into<String>, num_hash_rounds: usize) -> Self {
        Self {
            key: key.into(),
            algorithm: algorithm.into(),
            num_hash_rounds,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn num_hash_rounds(&self) -> usize {
        self.num_hash_rounds
    }

    /// Build a fresh cipher for one message.
    ///
    /// No salt is sent on the wire, so the salt size is left at its default.
    pub fn cipher(&self) -> BufferCrypt {
        BufferCrypt::new(self.key.len(), 0, self.num_hash_rounds, &self.algorithm)
    }

    /// Encrypt one message with the protocol's empty IV.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptError> {
        self.cipher().encrypt(&self.key, &[], plaintext)
    }

    /// Decrypt one message with the protocol's empty IV.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptError> {
        self.cipher().decrypt(&self.key, &[], ciphertext)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("num_hash_rounds", &self.num_hash_rounds)
            .finish()
    }
}
