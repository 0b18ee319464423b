// Impass — Record data models
//
// SECURITY: a record's secret is held in a zeroizing buffer and is never
// included in Debug output or log messages. Callers read it through the
// explicit `secret()` accessor.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

/// Number of random bytes behind an auto-generated secret.
pub const DEFAULT_SECRET_BYTES: usize = 18;

/// Upper bound for generated secrets. Larger requests are refused before
/// any buffer is allocated.
pub const MAX_SECRET_BYTES: usize = 4096;

/// One stored credential. The context it is filed under is the map key
/// that owns it.
///
/// On disk the fields keep their historical names, `password` and `date`.
/// Fields this version doesn't know are carried through a load and save
/// untouched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "password")]
    secret: Zeroizing<String>,
    #[serde(rename = "date", with = "iso8601")]
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Record {
    /// A record stamped with the current time.
    pub fn new(secret: Zeroizing<String>) -> Self {
        Self::with_timestamp(secret, now())
    }

    pub fn with_timestamp(secret: Zeroizing<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            secret,
            created_at,
            extra: BTreeMap::new(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// When this secret was generated or last replaced.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The exchange shape handed to dump-style callers.
    pub fn view(&self, include_secret: bool) -> RecordView<'_> {
        RecordView {
            date: self.created_at,
            secret: include_secret.then(|| self.secret()),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("secret", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("extra_fields", &self.extra.len())
            .finish()
    }
}

/// `{date, secret?}`: what a search result looks like to the outside.
/// The secret is omitted unless explicitly requested.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView<'a> {
    #[serde(with = "iso8601")]
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<&'a str>,
}

/// How the value of a new or replaced record is obtained.
///
/// `PromptInteractively` must be turned into a `Literal` by the caller
/// before it reaches the database.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSpec {
    /// Draw this many bytes from the OS CSPRNG.
    Generate(usize),
    Literal(Zeroizing<String>),
    PromptInteractively,
}

impl SecretSpec {
    pub fn literal(secret: impl Into<String>) -> Self {
        SecretSpec::Literal(Zeroizing::new(secret.into()))
    }
}

impl Default for SecretSpec {
    fn default() -> Self {
        SecretSpec::Generate(DEFAULT_SECRET_BYTES)
    }
}

impl fmt::Debug for SecretSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSpec::Generate(n) => f.debug_tuple("Generate").field(n).finish(),
            SecretSpec::Literal(_) => f.write_str("Literal([REDACTED])"),
            SecretSpec::PromptInteractively => f.write_str("PromptInteractively"),
        }
    }
}

/// Current time at the precision the file format stores.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// ISO-8601 timestamps as the file format writes them:
/// `2024-01-01T12:00:00.000000Z`. Values without an offset read as UTC.
pub(crate) mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
