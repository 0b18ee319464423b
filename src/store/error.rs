// Impass — Database error types

use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Can not add empty string context")]
    EmptyContext,

    #[error("Context '{0}' already exists")]
    DuplicateContext(String),

    #[error("Context '{0}' not found")]
    ContextNotFound(String),

    #[error("Database payload is corrupt: {0}")]
    CorruptPayload(#[source] serde_json::Error),

    #[error("Database is not a proper impass database (type: {})", .0.as_deref().unwrap_or("missing"))]
    UnsupportedType(Option<String>),

    #[error("Incompatible database (version: {})", .0.as_deref().unwrap_or("missing"))]
    UnsupportedVersion(Option<String>),

    #[error("Could not decrypt {}: {source}", .path.display())]
    Decryption {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },

    #[error("Could not retrieve OpenPGP key '{key_id}': {source}")]
    KeyResolution {
        key_id: String,
        #[source]
        source: CryptoError,
    },

    #[error("Could not encrypt database: {0}")]
    Encryption(#[source] CryptoError),

    #[error("Key ID for encryption not specified")]
    MissingKeyId,

    #[error("Save path not specified")]
    MissingPath,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secret length of {0} bytes exceeds the maximum of {}", crate::store::MAX_SECRET_BYTES)]
    SecretTooLong(usize),

    #[error("Secret must be resolved before it reaches the database")]
    UnresolvedSecret,
}
