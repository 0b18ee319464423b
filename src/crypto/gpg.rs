// Impass — GnuPG command-line backend
//
// Drives the `gpg` binary in batch mode. Machine-readable results come from
// `--status-fd 2` lines ("[GNUPG:] KEYWORD args") mixed into stderr, and
// key lookups use the `--with-colons` listing format.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use zeroize::Zeroizing;

use super::{CryptoError, KeyHandle, OpenPgpService, Validity};

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// `OpenPgpService` backed by the GnuPG executable.
#[derive(Debug, Clone)]
pub struct GpgCommand {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl GpgCommand {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Use a specific GnuPG home instead of the user's default keyring.
    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(homedir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch").arg("--yes");
        if let Some(ref home) = self.homedir {
            cmd.arg("--homedir").arg(home);
        }
        cmd
    }

    /// Run `cmd`, feeding `input` on stdin from a separate thread so a large
    /// payload can't deadlock against gpg filling its stdout pipe.
    fn run(&self, mut cmd: Command, input: &[u8]) -> Result<Output, CryptoError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            CryptoError::Service(format!("failed to run {}: {}", self.program.display(), e))
        })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CryptoError::Service("gpg stdin was not captured".to_string()))?;

        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;

        match written {
            Ok(Ok(())) => {}
            // gpg stopped reading early; its status output says why.
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(CryptoError::Service("stdin writer panicked".to_string())),
        }

        Ok(output)
    }

    fn run_decrypt(&self, ciphertext: &[u8], verify: bool) -> Result<DecryptOutcome, CryptoError> {
        let mut cmd = self.command();
        cmd.arg("--status-fd").arg("2");
        if !verify {
            cmd.arg("--skip-verify");
        }
        cmd.arg("--decrypt");

        let output = self.run(cmd, ciphertext)?;
        let plaintext = Zeroizing::new(output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let report = parse_status(&stderr);

        // gpg exits non-zero for a bad signature even when decryption worked,
        // so the status line is authoritative, not the exit code.
        if !report.decryption_okay {
            return Err(CryptoError::Decrypt(human_message(&stderr)));
        }

        Ok(DecryptOutcome {
            plaintext,
            signatures: report.signatures,
        })
    }
}

impl Default for GpgCommand {
    fn default() -> Self {
        Self::new()
    }
}

struct DecryptOutcome {
    plaintext: Zeroizing<Vec<u8>>,
    signatures: Vec<Validity>,
}

impl OpenPgpService for GpgCommand {
    fn decrypt_and_verify(
        &self,
        ciphertext: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<Validity>), CryptoError> {
        let outcome = self.run_decrypt(ciphertext, true)?;
        Ok((outcome.plaintext, outcome.signatures))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Ok(self.run_decrypt(ciphertext, false)?.plaintext)
    }

    fn encrypt_and_sign(
        &self,
        plaintext: &[u8],
        recipient: &KeyHandle,
        signer: &KeyHandle,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut cmd = self.command();
        cmd.args(["--armor", "--trust-model", "always", "--compress-algo", "none"])
            .arg("--local-user")
            .arg(signer.fingerprint())
            .arg("--recipient")
            .arg(recipient.fingerprint())
            .args(["--sign", "--encrypt"]);

        let output = self.run(cmd, plaintext)?;
        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CryptoError::Encrypt(human_message(&stderr)));
        }
        Ok(output.stdout)
    }

    fn resolve_key(&self, key_id: &str) -> Result<KeyHandle, CryptoError> {
        let mut cmd = self.command();
        cmd.args(["--with-colons", "--list-keys", "--"]).arg(key_id);

        let output = self.run(cmd, &[])?;
        if !output.status.success() {
            return Err(CryptoError::KeyNotFound(key_id.to_string()));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let fingerprints = primary_fingerprints(&listing);
        match fingerprints.as_slice() {
            [] => Err(CryptoError::KeyNotFound(key_id.to_string())),
            [only] => Ok(KeyHandle::new(only.clone())),
            many => Err(CryptoError::AmbiguousKey(key_id.to_string(), many.len())),
        }
    }
}

// ─── Output Parsing ──────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct StatusReport {
    decryption_okay: bool,
    signatures: Vec<Validity>,
}

struct SignatureState {
    validity: Validity,
    /// `None` until GOODSIG/BADSIG/... has been seen for this signature.
    good: Option<bool>,
}

/// Collect decryption outcome and per-signature validity from status lines.
fn parse_status(stderr: &str) -> StatusReport {
    let mut decryption_okay = false;
    let mut sigs: Vec<SignatureState> = Vec::new();

    for line in stderr.lines() {
        let Some(status) = line.strip_prefix(STATUS_PREFIX) else {
            continue;
        };
        let keyword = status.split_whitespace().next().unwrap_or("");

        match keyword {
            "DECRYPTION_OKAY" => decryption_okay = true,
            "NEWSIG" => sigs.push(SignatureState {
                validity: Validity::Unknown,
                good: None,
            }),
            "GOODSIG" => record_verdict(&mut sigs, true),
            "BADSIG" | "ERRSIG" | "EXPSIG" | "EXPKEYSIG" | "REVKEYSIG" => {
                record_verdict(&mut sigs, false)
            }
            trust if trust.starts_with("TRUST_") => {
                let validity = match trust {
                    "TRUST_UNDEFINED" => Validity::Undefined,
                    "TRUST_NEVER" => Validity::Never,
                    "TRUST_MARGINAL" => Validity::Marginal,
                    "TRUST_FULLY" => Validity::Full,
                    "TRUST_ULTIMATE" => Validity::Ultimate,
                    _ => Validity::Unknown,
                };
                if let Some(last) = sigs.last_mut() {
                    if last.good == Some(true) {
                        last.validity = validity;
                    }
                }
            }
            _ => {}
        }
    }

    StatusReport {
        decryption_okay,
        signatures: sigs.into_iter().map(|s| s.validity).collect(),
    }
}

fn record_verdict(sigs: &mut Vec<SignatureState>, good: bool) {
    let validity = if good { Validity::Unknown } else { Validity::Never };
    match sigs.last_mut() {
        Some(last) if last.good.is_none() => {
            last.good = Some(good);
            last.validity = validity;
        }
        _ => sigs.push(SignatureState {
            validity,
            good: Some(good),
        }),
    }
}

/// Fingerprints of every primary key in a `--with-colons` listing.
fn primary_fingerprints(listing: &str) -> Vec<String> {
    let mut fingerprints = Vec::new();
    let mut expect_primary_fpr = false;

    for line in listing.lines() {
        let mut fields = line.split(':');
        match fields.next() {
            Some("pub") => expect_primary_fpr = true,
            Some("fpr") if expect_primary_fpr => {
                if let Some(fpr) = fields.nth(8).filter(|f| !f.is_empty()) {
                    fingerprints.push(fpr.to_string());
                }
                expect_primary_fpr = false;
            }
            _ => {}
        }
    }

    fingerprints
}

/// The human-readable part of gpg's stderr, without status lines.
fn human_message(stderr: &str) -> String {
    let message = stderr
        .lines()
        .filter(|l| !l.starts_with(STATUS_PREFIX))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    if message.is_empty() {
        "gpg reported no details".to_string()
    } else {
        message
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
