// Impass — Database handle
//
// Ties the pieces together:
//   open: gateway.open_ciphertext → codec::decode → Entries
//   save: codec::encode → gateway.seal_plaintext → writer::write_atomic
//
// All mutations happen in memory; nothing reaches the disk until `save`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};

use crate::crypto::{CryptoError, CryptoGateway, OpenPgpService, SignatureStatus};

use super::codec;
use super::config::Config;
use super::entries::Entries;
use super::models::{Record, SecretSpec, DEFAULT_SECRET_BYTES};
use super::writer;
use super::DatabaseError;

/// An impass database loaded into memory.
pub struct Database {
    entries: Entries,
    signature: SignatureStatus,
    path: Option<PathBuf>,
    key_id: Option<String>,
    secret_bytes: usize,
}

impl Database {
    /// An empty, never-saved database.
    pub fn new(path: Option<PathBuf>, key_id: Option<String>) -> Self {
        Self {
            entries: Entries::new(),
            signature: SignatureStatus::Unknown,
            path,
            key_id,
            secret_bytes: DEFAULT_SECRET_BYTES,
        }
    }

    /// Load the database at `path`. A missing path, or one that doesn't
    /// exist yet, gives an empty database with signature status `Unknown`.
    ///
    /// An invalid signature is not an error: check `signature_status()`
    /// and warn the user.
    pub fn open<S: OpenPgpService>(
        gateway: &CryptoGateway<S>,
        path: Option<&Path>,
        key_id: Option<&str>,
    ) -> Result<Self, DatabaseError> {
        let mut db = Self::new(path.map(Path::to_path_buf), key_id.map(str::to_string));

        let path = match path {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!("No database file yet, starting empty");
                return Ok(db);
            }
        };

        let opened = gateway
            .open_ciphertext(path, key_id)
            .map_err(|e| match e {
                CryptoError::Io(io) => DatabaseError::Io(io),
                other => DatabaseError::Decryption {
                    path: path.to_path_buf(),
                    source: other,
                },
            })?;
        let envelope = codec::decode(&opened.cleartext)?;

        db.entries = Entries::from_collection(envelope.entries);
        db.signature = opened.signature;

        if db.signature == SignatureStatus::Invalid {
            tracing::warn!(path = %path.display(), "Could not validate OpenPGP signature on database");
        }
        tracing::debug!(entries = db.entries.len(), "Database loaded");

        Ok(db)
    }

    pub fn open_with_config<S: OpenPgpService>(
        gateway: &CryptoGateway<S>,
        config: &Config,
    ) -> Result<Self, DatabaseError> {
        let mut db = Self::open(gateway, config.db_path.as_deref(), config.key_id.as_deref())?;
        db.secret_bytes = config.secret_bytes;
        Ok(db)
    }

    /// Encrypt, sign and write the database.
    ///
    /// `key_id` and `path` fall back to the values the handle was opened
    /// with. The in-memory signature status is left alone.
    pub fn save<S: OpenPgpService>(
        &self,
        gateway: &CryptoGateway<S>,
        key_id: Option<&str>,
        path: Option<&Path>,
    ) -> Result<(), DatabaseError> {
        let key_id = key_id
            .or(self.key_id.as_deref())
            .ok_or(DatabaseError::MissingKeyId)?;
        let path = path
            .or(self.path.as_deref())
            .ok_or(DatabaseError::MissingPath)?;

        let cleartext = codec::encode(self.entries.as_collection())?;
        let ciphertext = gateway.seal_plaintext(&cleartext, key_id).map_err(|e| {
            if e.is_key_resolution() {
                DatabaseError::KeyResolution {
                    key_id: key_id.to_string(),
                    source: e,
                }
            } else {
                DatabaseError::Encryption(e)
            }
        })?;
        writer::write_atomic(path, &ciphertext)?;

        tracing::debug!(entries = self.entries.len(), path = %path.display(), "Database saved");
        Ok(())
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn signature_status(&self) -> SignatureStatus {
        self.signature
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Spec for callers that don't name a secret: generate the configured
    /// number of bytes.
    pub fn default_secret(&self) -> SecretSpec {
        SecretSpec::Generate(self.secret_bytes)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.entries.contains(context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.entries.contexts()
    }

    pub fn get(&self, context: &str) -> Option<&Record> {
        self.entries.lookup_exact(context)
    }

    pub fn search(&self, query: Option<&str>) -> BTreeMap<&str, &Record> {
        self.entries.search(query)
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    pub fn add(&mut self, context: &str, spec: SecretSpec) -> Result<&Record, DatabaseError> {
        self.entries.add(context, spec)
    }

    pub fn replace(&mut self, context: &str, spec: SecretSpec) -> Result<&Record, DatabaseError> {
        self.entries.replace(context, spec)
    }

    pub fn remove(&mut self, context: &str) -> Result<Record, DatabaseError> {
        self.entries.remove(context)
    }

    pub fn update(&mut self, old: &str, new: &str) -> Result<&Record, DatabaseError> {
        self.entries.update(old, new)
    }
}

impl Index<&str> for Database {
    type Output = Record;

    /// Panics if `context` is absent; use `get` to check first.
    fn index(&self, context: &str) -> &Record {
        self.entries
            .lookup_exact(context)
            .unwrap_or_else(|| panic!("no database entry for context '{}'", context))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("signature", &self.signature)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
