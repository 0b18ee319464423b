// Impass — Crypto error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("no usable OpenPGP key for '{0}'")]
    KeyNotFound(String),

    #[error("key id '{0}' is ambiguous ({1} keys match)")]
    AmbiguousKey(String, usize),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("OpenPGP service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// True when the failure came from looking up a key rather than from
    /// the cipher operation itself.
    pub fn is_key_resolution(&self) -> bool {
        matches!(self, CryptoError::KeyNotFound(_) | CryptoError::AmbiguousKey(..))
    }
}
