// Impass — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: add, replace, update, dump, remove, version.
//
// Every option can also come from an IMPASS_* environment variable. Only
// this layer reads the environment; the store gets an explicit `Config`.

mod commands;
mod settings;
mod terminal;

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};

pub use commands::{execute, run};
pub use settings::{parse_pwspec, Settings};
pub use terminal::{Terminal, Tty};

/// Impass: simple and secure password management and retrieval.
///
/// The database is a single JSON object, OpenPGP encrypted and signed,
/// keyed by 'context'. A context of '-' is read from stdin and ':' forces
/// a prompt.
#[derive(Parser, Debug)]
#[command(name = "impass")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the database file [default: ~/.impass/db].
    #[arg(long, env = "IMPASS_DB", global = true)]
    pub db: Option<PathBuf>,

    /// OpenPGP key ID to encrypt and sign the database with.
    #[arg(long, env = "IMPASS_KEYID", global = true)]
    pub keyid: Option<String>,

    /// File the key ID is read from and saved to [default: ~/.impass/keyid].
    #[arg(long, env = "IMPASS_KEYFILE", global = true)]
    pub keyfile: Option<PathBuf>,

    /// GnuPG program to run.
    #[arg(long, env = "IMPASS_GPG", global = true, default_value = "gpg")]
    pub gpg: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new entry. Fails if the context already exists.
    Add {
        /// New database context, ':' for prompt, or '-' for stdin.
        context: Option<String>,

        /// Password spec: N octets of entropy or ':' for prompt.
        #[arg(env = "IMPASS_PASSWORD")]
        pwspec: Option<String>,
    },

    /// Replace the password of an existing entry.
    Replace {
        /// Existing database context, ':' for prompt, or '-' for stdin.
        context: Option<String>,

        /// Password spec: N octets of entropy or ':' for prompt.
        #[arg(env = "IMPASS_PASSWORD")]
        pwspec: Option<String>,
    },

    /// Rename an entry, keeping its password and date.
    Update {
        /// Existing database context, ':' for prompt, or '-' for stdin.
        old_context: Option<String>,

        /// New database context or ':' for prompt.
        new_context: Option<String>,
    },

    /// Dump entries as JSON. Passwords are omitted unless requested.
    Dump {
        /// Only dump entries whose context contains this string.
        string: Option<String>,

        /// Include passwords in the output.
        #[arg(long, env = "IMPASS_DUMP_PASSWORDS", value_parser = FalseyValueParser::new())]
        secrets: bool,
    },

    /// Remove an entry after typed confirmation.
    Remove {
        /// Existing database context, ':' for prompt, or '-' for stdin.
        context: Option<String>,
    },

    /// Print version.
    Version,
}
