// Impass — Envelope codec
//
// The cleartext inside the OpenPGP message is a JSON envelope:
//
//   { "type": "impass", "version": 1, "entries": { <context>: <record> } }
//
// `type` and `version` are checked on every decode; anything else is a hard
// failure rather than a migration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

use super::models::Record;
use super::DatabaseError;

/// Envelope type written by this codec.
pub const DB_TYPE: &str = "impass";

/// Type used by databases written under the program's former name.
pub const LEGACY_DB_TYPE: &str = "assword";

/// The only envelope version this codec reads or writes.
pub const DB_VERSION: u64 = 1;

/// Context → record. Ordered so encoded output is stable across saves.
pub type Collection = BTreeMap<String, Record>;

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub db_type: String,
    pub version: u64,
    pub entries: Collection,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    #[serde(rename = "type")]
    db_type: &'a str,
    version: u64,
    entries: &'a Collection,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    #[serde(rename = "type")]
    db_type: Option<Value>,
    version: Option<Value>,
    entries: Option<Collection>,
}

/// Serialize `entries` as a pretty-printed (2-space) UTF-8 envelope.
pub fn encode(entries: &Collection) -> Result<Zeroizing<Vec<u8>>, DatabaseError> {
    let envelope = EnvelopeOut {
        db_type: DB_TYPE,
        version: DB_VERSION,
        entries,
    };
    let bytes = serde_json::to_vec_pretty(&envelope).map_err(DatabaseError::CorruptPayload)?;
    tracing::debug!(entries = entries.len(), bytes = bytes.len(), "Envelope encoded");
    Ok(Zeroizing::new(bytes))
}

/// Parse and validate an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DatabaseError> {
    let raw: EnvelopeIn = serde_json::from_slice(bytes).map_err(DatabaseError::CorruptPayload)?;

    let db_type = match raw.db_type.as_ref().and_then(Value::as_str) {
        Some(t) if t == DB_TYPE || t == LEGACY_DB_TYPE => t.to_string(),
        _ => return Err(DatabaseError::UnsupportedType(raw.db_type.map(describe))),
    };

    let version = match raw.version.as_ref().and_then(Value::as_u64) {
        Some(DB_VERSION) => DB_VERSION,
        _ => return Err(DatabaseError::UnsupportedVersion(raw.version.map(describe))),
    };

    let entries = raw.entries.ok_or_else(|| {
        DatabaseError::CorruptPayload(<serde_json::Error as serde::de::Error>::missing_field(
            "entries",
        ))
    })?;

    if db_type == LEGACY_DB_TYPE {
        tracing::info!("Loaded legacy '{}' envelope; it will be saved as '{}'", LEGACY_DB_TYPE, DB_TYPE);
    }
    tracing::debug!(entries = entries.len(), "Envelope decoded");

    Ok(Envelope {
        db_type,
        version,
        entries,
    })
}

fn describe(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
