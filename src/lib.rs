// Impass — Library root
//
// Re-exports the crypto, store, and CLI modules.

pub mod cli;
pub mod crypto;
pub mod error;
pub mod store;

pub use error::{ImpassError, Result};
pub use store::{Config, Database, DatabaseError, Record, SecretSpec, SignatureStatus};
