// Impass — CLI Command Handlers
//
// Each function handles one CLI subcommand. They resolve the key id, open
// the database through the crypto gateway, apply one mutation, and save.
// Status messages go to stderr; only `dump` writes to stdout.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use zeroize::Zeroizing;

use crate::crypto::{CryptoGateway, OpenPgpService};
use crate::error::{ImpassError, Result};
use crate::store::{Database, DatabaseError, RecordView, SecretSpec, SignatureStatus};

use super::settings::{parse_pwspec, Settings};
use super::terminal::{Terminal, Tty};
use super::{Cli, Commands};

#[cfg(not(feature = "gpgme"))]
fn backend(settings: &Settings) -> crate::crypto::GpgCommand {
    crate::crypto::GpgCommand::new().with_program(&settings.gpg)
}

#[cfg(feature = "gpgme")]
fn backend(_settings: &Settings) -> crate::crypto::Gpgme {
    crate::crypto::Gpgme::new()
}

/// Execute the parsed CLI command against the real terminal and keyring.
pub fn execute(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::from_cli(&cli)?;
    let gateway = CryptoGateway::new(backend(&settings));
    run(cli.command, &settings, &gateway, &mut Tty, &mut io::stdout().lock())
}

/// Execute `command` with an explicit gateway, terminal, and output sink.
pub fn run<S, T>(
    command: Commands,
    settings: &Settings,
    gateway: &CryptoGateway<S>,
    term: &mut T,
    out: &mut dyn Write,
) -> Result<()>
where
    S: OpenPgpService,
    T: Terminal,
{
    let session = Session {
        settings,
        gateway,
    };

    match command {
        Commands::Add { context, pwspec } => session.cmd_add(term, context, pwspec),
        Commands::Replace { context, pwspec } => session.cmd_replace(term, context, pwspec),
        Commands::Update {
            old_context,
            new_context,
        } => session.cmd_update(term, old_context, new_context),
        Commands::Dump { string, secrets } => session.cmd_dump(term, string, secrets, out),
        Commands::Remove { context } => session.cmd_remove(term, context),
        Commands::Version => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
    }
}

struct Session<'a, S> {
    settings: &'a Settings,
    gateway: &'a CryptoGateway<S>,
}

impl<S: OpenPgpService> Session<'_, S> {
    fn key_id<T: Terminal>(&self, term: &mut T) -> Result<String> {
        self.settings.resolve_key_id(self.gateway, || {
            eprintln!("OpenPGP key ID of encryption target not specified.");
            eprintln!("Please provide key ID in IMPASS_KEYID environment variable,");
            eprintln!("or specify key ID now to save in {}.", self.settings.keyfile.display());
            term.read_line("OpenPGP key ID: ", None)
        })
    }

    /// Open the database. Unless `create` is set, a missing file is an error.
    fn open_db<T: Terminal>(&self, term: &mut T, create: bool) -> Result<Database> {
        let key_id = self.key_id(term)?;
        let path = &self.settings.db_path;
        if !create && !path.exists() {
            return Err(ImpassError::NotFound(path.clone()));
        }

        let db = Database::open_with_config(self.gateway, &self.settings.config(&key_id))?;
        if db.signature_status() == SignatureStatus::Invalid {
            eprintln!("WARNING: could not validate OpenPGP signature on db file.");
        }
        Ok(db)
    }

    fn save(&self, db: &Database) -> Result<()> {
        if let Some(dir) = db.path().and_then(Path::parent) {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
                tracing::info!(dir = %dir.display(), "Created database directory");
            }
        }
        db.save(self.gateway, None, None)?;
        Ok(())
    }

    // ─── Add ─────────────────────────────────────────────────────────────────

    fn cmd_add<T: Terminal>(
        &self,
        term: &mut T,
        context: Option<String>,
        pwspec: Option<String>,
    ) -> Result<()> {
        let spec = parse_pwspec(pwspec.as_deref())?;
        let mut db = self.open_db(term, true)?;

        let context = retrieve_context(term, context.as_deref(), "context: ", None, true)?;
        if db.contains(&context) {
            return Err(DatabaseError::DuplicateContext(context).into());
        }
        let spec = resolve_secret(term, spec.unwrap_or_else(|| db.default_secret()))?;

        db.add(&context, spec)?;
        self.save(&db)?;
        eprintln!("New entry written.");
        Ok(())
    }

    // ─── Replace ─────────────────────────────────────────────────────────────

    fn cmd_replace<T: Terminal>(
        &self,
        term: &mut T,
        context: Option<String>,
        pwspec: Option<String>,
    ) -> Result<()> {
        let spec = parse_pwspec(pwspec.as_deref())?;
        let mut db = self.open_db(term, false)?;

        let context = retrieve_context(term, context.as_deref(), "context: ", None, true)?;
        if !db.contains(&context) {
            return Err(DatabaseError::ContextNotFound(context).into());
        }
        let spec = resolve_secret(term, spec.unwrap_or_else(|| db.default_secret()))?;

        db.replace(&context, spec)?;
        self.save(&db)?;
        eprintln!("Password replaced.");
        Ok(())
    }

    // ─── Update ──────────────────────────────────────────────────────────────

    fn cmd_update<T: Terminal>(
        &self,
        term: &mut T,
        old_context: Option<String>,
        new_context: Option<String>,
    ) -> Result<()> {
        let mut db = self.open_db(term, false)?;

        let old = retrieve_context(term, old_context.as_deref(), "old context: ", None, true)?;
        if !db.contains(&old) {
            return Err(DatabaseError::ContextNotFound(old).into());
        }
        // '-' is only honoured for the old context.
        let new = retrieve_context(term, new_context.as_deref(), "new context: ", Some(&old), false)?;

        db.update(&old, &new)?;
        self.save(&db)?;
        eprintln!("Entry updated.");
        Ok(())
    }

    // ─── Dump ────────────────────────────────────────────────────────────────

    fn cmd_dump<T: Terminal>(
        &self,
        term: &mut T,
        string: Option<String>,
        secrets: bool,
        out: &mut dyn Write,
    ) -> Result<()> {
        let db = self.open_db(term, false)?;

        let views: BTreeMap<&str, RecordView<'_>> = db
            .search(string.as_deref())
            .into_iter()
            .map(|(context, record)| (context, record.view(secrets)))
            .collect();

        let json = Zeroizing::new(
            serde_json::to_string_pretty(&views)
                .map_err(|e| ImpassError::Database(DatabaseError::CorruptPayload(e)))?,
        );
        writeln!(out, "{}", json.as_str())?;
        Ok(())
    }

    // ─── Remove ──────────────────────────────────────────────────────────────

    fn cmd_remove<T: Terminal>(&self, term: &mut T, context: Option<String>) -> Result<()> {
        let mut db = self.open_db(term, false)?;

        let context = retrieve_context(term, context.as_deref(), "context: ", None, true)?;
        if !db.contains(&context) {
            return Err(DatabaseError::ContextNotFound(context).into());
        }

        eprintln!("Really remove entry '{}'?", context);
        let response = term.read_line("Type 'yes' to remove: ", None)?;
        if response != "yes" {
            return Err(ImpassError::Aborted);
        }

        db.remove(&context)?;
        self.save(&db)?;
        eprintln!("Entry removed.");
        Ok(())
    }
}

// ─── Input Helpers ───────────────────────────────────────────────────────────

/// Context from the argument, stdin (`-`), or a prompt (`:` or absent).
/// Surrounding whitespace is always stripped.
fn retrieve_context<T: Terminal>(
    term: &mut T,
    arg: Option<&str>,
    prompt: &str,
    default: Option<&str>,
    allow_stdin: bool,
) -> Result<String> {
    let raw = match arg {
        Some("-") if allow_stdin => term.read_stdin()?,
        Some(":") | None => term.read_line(prompt, default)?,
        Some(other) => other.to_string(),
    };
    Ok(raw.trim().to_string())
}

/// Turn `PromptInteractively` into a literal by asking twice.
fn resolve_secret<T: Terminal>(term: &mut T, spec: SecretSpec) -> Result<SecretSpec> {
    match spec {
        SecretSpec::PromptInteractively => {
            let first = term.read_secret("password: ")?;
            let second = term.read_secret("reenter password: ")?;
            if first != second {
                return Err(ImpassError::InvalidInput(
                    "Passwords do not match. Aborting.".to_string(),
                ));
            }
            Ok(SecretSpec::Literal(first))
        }
        other => {
            eprintln!("Auto-generating password...");
            Ok(other)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::super::terminal::mock::ScriptedTerminal;
    use super::*;
    use crate::crypto::mock::MockPgp;
    use crate::crypto::Validity;

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: Settings,
        gateway: CryptoGateway<MockPgp>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_service(MockPgp::new().with_key("ABCDEF"))
        }

        fn with_service(service: MockPgp) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let settings = Settings {
                db_path: dir.path().join("store").join("db"),
                keyfile: dir.path().join("keyid"),
                key_id: Some("ABCDEF".to_string()),
                gpg: PathBuf::from("gpg"),
            };
            Self {
                _dir: dir,
                settings,
                gateway: CryptoGateway::new(service),
            }
        }

        fn run(&self, command: Commands, term: &mut ScriptedTerminal) -> Result<String> {
            let mut out = Vec::new();
            run(command, &self.settings, &self.gateway, term, &mut out)?;
            Ok(String::from_utf8(out).unwrap())
        }

        fn add(&self, context: &str, pwspec: Option<&str>) {
            self.run(
                Commands::Add {
                    context: Some(context.to_string()),
                    pwspec: pwspec.map(str::to_string),
                },
                &mut ScriptedTerminal::new(),
            )
            .unwrap();
        }

        fn load(&self) -> Database {
            Database::open(&self.gateway, Some(&self.settings.db_path), None).unwrap()
        }

        fn dump(&self, string: Option<&str>, secrets: bool) -> serde_json::Value {
            let out = self
                .run(
                    Commands::Dump {
                        string: string.map(str::to_string),
                        secrets,
                    },
                    &mut ScriptedTerminal::new(),
                )
                .unwrap();
            serde_json::from_str(&out).unwrap()
        }
    }

    #[test]
    fn test_add_creates_database_and_directory() {
        let fx = Fixture::new();
        fx.add("example.com", Some("12"));

        let db = fx.load();
        assert_eq!(db.contexts().collect::<Vec<_>>(), vec!["example.com"]);
        assert_eq!(db.signature_status(), SignatureStatus::Valid);
    }

    #[test]
    fn test_add_existing_context_fails_with_code_2() {
        let fx = Fixture::new();
        fx.add("mail", None);

        let err = fx
            .run(
                Commands::Add {
                    context: Some("mail".to_string()),
                    pwspec: None,
                },
                &mut ScriptedTerminal::new(),
            )
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_add_trims_context_and_reads_stdin() {
        let fx = Fixture::new();
        let mut term = ScriptedTerminal::new().with_stdin("  piped.example\n");
        fx.run(
            Commands::Add {
                context: Some("-".to_string()),
                pwspec: None,
            },
            &mut term,
        )
        .unwrap();

        assert!(fx.load().contains("piped.example"));
    }

    #[test]
    fn test_add_with_prompted_password() {
        let fx = Fixture::new();
        let mut term = ScriptedTerminal::new()
            .with_line("bank")
            .with_secret("s3cret")
            .with_secret("s3cret");
        fx.run(
            Commands::Add {
                context: None,
                pwspec: Some(":".to_string()),
            },
            &mut term,
        )
        .unwrap();

        assert_eq!(fx.load()["bank"].secret(), "s3cret");
    }

    #[test]
    fn test_mismatched_password_prompt_aborts_without_saving() {
        let fx = Fixture::new();
        let mut term = ScriptedTerminal::new().with_secret("one").with_secret("two");
        let err = fx
            .run(
                Commands::Add {
                    context: Some("bank".to_string()),
                    pwspec: Some("prompt".to_string()),
                },
                &mut term,
            )
            .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(!fx.settings.db_path.exists());
    }

    #[test]
    fn test_literal_pwspec_is_refused() {
        let fx = Fixture::new();
        let err = fx
            .run(
                Commands::Add {
                    context: Some("bank".to_string()),
                    pwspec: Some("hunter2".to_string()),
                },
                &mut ScriptedTerminal::new(),
            )
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_commands_on_missing_database_exit_5() {
        let fx = Fixture::new();
        let err = fx
            .run(
                Commands::Dump {
                    string: None,
                    secrets: false,
                },
                &mut ScriptedTerminal::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ImpassError::NotFound(_)));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_replace_changes_secret() {
        let fx = Fixture::new();
        fx.add("bank", Some("8"));
        let before = fx.load()["bank"].secret().to_string();

        fx.run(
            Commands::Replace {
                context: Some("bank".to_string()),
                pwspec: Some("8".to_string()),
            },
            &mut ScriptedTerminal::new(),
        )
        .unwrap();

        assert_ne!(fx.load()["bank"].secret(), before);
    }

    #[test]
    fn test_update_prompt_defaults_to_old_context() {
        let fx = Fixture::new();
        fx.add("old", None);

        // An empty answer keeps the old name, which is then a duplicate.
        let mut term = ScriptedTerminal::new().with_line("");
        let err = fx
            .run(
                Commands::Update {
                    old_context: Some("old".to_string()),
                    new_context: None,
                },
                &mut term,
            )
            .unwrap_err();
        assert!(matches!(err, ImpassError::Database(DatabaseError::DuplicateContext(_))));

        let mut term = ScriptedTerminal::new().with_line(" renamed ");
        fx.run(
            Commands::Update {
                old_context: Some("old".to_string()),
                new_context: None,
            },
            &mut term,
        )
        .unwrap();
        let db = fx.load();
        assert!(db.contains("renamed"));
        assert!(!db.contains("old"));
    }

    #[test]
    fn test_remove_requires_typed_yes() {
        let fx = Fixture::new();
        fx.add("gone", None);

        let mut term = ScriptedTerminal::new().with_line("y");
        let err = fx
            .run(Commands::Remove { context: Some("gone".to_string()) }, &mut term)
            .unwrap_err();
        assert!(matches!(err, ImpassError::Aborted));
        assert!(fx.load().contains("gone"));

        let mut term = ScriptedTerminal::new().with_line("yes");
        fx.run(Commands::Remove { context: Some("gone".to_string()) }, &mut term)
            .unwrap();
        assert!(fx.load().is_empty());
    }

    #[test]
    fn test_dump_hides_secrets_unless_asked() {
        let fx = Fixture::new();
        fx.add("alpha", None);
        fx.add("beta", None);

        let hidden = fx.dump(None, false);
        assert_eq!(hidden.as_object().unwrap().len(), 2);
        assert!(hidden["alpha"].get("date").is_some());
        assert!(hidden["alpha"].get("secret").is_none());

        let shown = fx.dump(Some("bet"), true);
        let keys: Vec<&String> = shown.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["beta"]);
        assert_eq!(
            shown["beta"]["secret"].as_str().unwrap(),
            fx.load()["beta"].secret()
        );
    }

    #[test]
    fn test_invalid_signature_still_dumps() {
        let fx = Fixture::with_service(
            MockPgp::new()
                .with_key("ABCDEF")
                .with_validity(Validity::Marginal),
        );
        fx.add("alpha", None);
        assert_eq!(fx.load().signature_status(), SignatureStatus::Invalid);
        assert!(fx.dump(None, false).get("alpha").is_some());
    }

    #[test]
    fn test_version_goes_to_output() {
        let fx = Fixture::new();
        let out = fx.run(Commands::Version, &mut ScriptedTerminal::new()).unwrap();
        assert_eq!(out.trim(), env!("CARGO_PKG_VERSION"));
    }
}
