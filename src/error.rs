// Impass — Top-level error types
//
// Aggregates errors from the crypto and store modules into a single
// error enum for the application boundary, and maps each to the
// process exit code the CLI reports.

use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::store::DatabaseError;

/// Top-level error type for all impass operations.
#[derive(Debug, Error)]
pub enum ImpassError {
    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Crypto(#[from] CryptoError),

    #[error("Database not found at {}. Use 'impass add' to create.", .0.display())]
    NotFound(PathBuf),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Usage(String),

    #[error("Aborted")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImpassError {
    /// Process exit code for this error.
    ///
    /// 1 usage or bad input, 2 invalid context, 5 database missing,
    /// 10 other database error, 20 OpenPGP or key error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ImpassError::Usage(_) | ImpassError::Aborted => 1,
            ImpassError::InvalidInput(_) => 2,
            ImpassError::NotFound(_) => 5,
            ImpassError::Crypto(_) => 20,
            ImpassError::Database(e) => match e {
                DatabaseError::EmptyContext
                | DatabaseError::DuplicateContext(_)
                | DatabaseError::ContextNotFound(_)
                | DatabaseError::SecretTooLong(_) => 2,
                DatabaseError::Decryption { .. }
                | DatabaseError::KeyResolution { .. }
                | DatabaseError::Encryption(_)
                | DatabaseError::MissingKeyId => 20,
                _ => 10,
            },
            ImpassError::Io(_) => 10,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImpassError>;
