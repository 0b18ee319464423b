// Impass — Database configuration
//
// Everything the engine needs from its caller. The engine never reads the
// process environment; the CLI builds this from its options.

use std::path::PathBuf;

use super::models::DEFAULT_SECRET_BYTES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database file. `None` means an in-memory database until a save path
    /// is given.
    pub db_path: Option<PathBuf>,
    /// Default OpenPGP key id for encryption and signing.
    pub key_id: Option<String>,
    /// Byte length of generated secrets when the caller doesn't specify one.
    /// See `Database::default_secret`.
    pub secret_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            key_id: None,
            secret_bytes: DEFAULT_SECRET_BYTES,
        }
    }
}

impl Config {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(db_path.into()),
            ..Self::default()
        }
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_secret_bytes(mut self, secret_bytes: usize) -> Self {
        self.secret_bytes = secret_bytes;
        self
    }
}
