// Impass — CLI settings
//
// Resolves the command-line options (and their IMPASS_* environment
// fallbacks) into concrete paths, the key id, and the store `Config`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::crypto::{CryptoGateway, OpenPgpService};
use crate::error::{ImpassError, Result};
use crate::store::{Config, DatabaseError, SecretSpec, MAX_SECRET_BYTES};

use super::Cli;

const DATA_DIR: &str = ".impass";
const DB_FILE: &str = "db";
const KEYID_FILE: &str = "keyid";

/// Default directory for impass data files, `~/.impass`.
fn data_dir() -> Result<PathBuf> {
    dirs_next::home_dir()
        .map(|home| home.join(DATA_DIR))
        .ok_or_else(|| ImpassError::Usage("Could not determine home directory".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub keyfile: PathBuf,
    pub key_id: Option<String>,
    pub gpg: PathBuf,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let (db_path, keyfile) = match (&cli.db, &cli.keyfile) {
            (Some(db), Some(keyfile)) => (db.clone(), keyfile.clone()),
            (db, keyfile) => {
                let dir = data_dir()?;
                (
                    db.clone().unwrap_or_else(|| dir.join(DB_FILE)),
                    keyfile.clone().unwrap_or_else(|| dir.join(KEYID_FILE)),
                )
            }
        };

        Ok(Self {
            db_path,
            keyfile,
            key_id: cli.keyid.clone().filter(|k| !k.is_empty()),
            gpg: cli.gpg.clone(),
        })
    }

    /// Store configuration for the resolved key.
    pub fn config(&self, key_id: &str) -> Config {
        Config::new(&self.db_path).with_key_id(key_id)
    }

    /// The key to encrypt to: the option or environment value, else the
    /// key file, else whatever `prompt` returns.
    ///
    /// The key is always checked against the keyring. A prompted key is
    /// saved to the key file once it checks out.
    pub fn resolve_key_id<S, F>(&self, gateway: &CryptoGateway<S>, prompt: F) -> Result<String>
    where
        S: OpenPgpService,
        F: FnOnce() -> io::Result<String>,
    {
        let (key_id, prompted) = match &self.key_id {
            Some(k) => (k.clone(), false),
            None => match read_keyfile(&self.keyfile)? {
                Some(k) => (k, false),
                None => (prompt()?.trim().to_string(), true),
            },
        };
        if key_id.is_empty() {
            return Err(DatabaseError::MissingKeyId.into());
        }

        gateway
            .resolve_key(&key_id)
            .map_err(|source| DatabaseError::KeyResolution {
                key_id: key_id.clone(),
                source,
            })?;

        if prompted {
            save_keyfile(&self.keyfile, &key_id)?;
            tracing::info!(keyfile = %self.keyfile.display(), "Saved key id");
        }
        Ok(key_id)
    }
}

fn read_keyfile(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let key_id = contents.trim();
            Ok((!key_id.is_empty()).then(|| key_id.to_string()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_keyfile(path: &Path, key_id: &str) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, key_id)
}

/// Interpret a password spec: a byte count to generate, or `:` / `prompt`
/// to ask for it. `None` leaves the choice to the database default.
///
/// Anything else is refused so secrets never end up in shell history.
pub fn parse_pwspec(raw: Option<&str>) -> Result<Option<SecretSpec>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(":") | Some("prompt") => Ok(Some(SecretSpec::PromptInteractively)),
        Some(s) => match s.parse::<usize>() {
            Ok(0) => Err(ImpassError::Usage("Password spec must be at least 1 octet".to_string())),
            Ok(n) if n > MAX_SECRET_BYTES => Err(ImpassError::Usage(format!(
                "Password spec must be at most {} octets",
                MAX_SECRET_BYTES
            ))),
            Ok(n) => Ok(Some(SecretSpec::Generate(n))),
            Err(_) => Err(ImpassError::Usage(
                "Don't type your password on the command line!".to_string(),
            )),
        },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
