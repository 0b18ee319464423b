// Impass — Store Module
//
// The database engine: a context-keyed collection of secrets, serialized
// as a JSON envelope and kept on disk as one signed, encrypted OpenPGP
// message. All OpenPGP work goes through `crate::crypto`.

pub mod codec;
mod config;
mod db;
mod entries;
mod error;
mod models;
pub mod writer;

pub use codec::{Collection, Envelope, DB_TYPE, DB_VERSION, LEGACY_DB_TYPE};
pub use config::Config;
pub use db::Database;
pub use entries::{generate_secret, Entries};
pub use error::DatabaseError;
pub use models::{Record, RecordView, SecretSpec, DEFAULT_SECRET_BYTES, MAX_SECRET_BYTES};

pub use crate::crypto::SignatureStatus;
