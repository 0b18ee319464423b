// Impass — Crypto Gateway
//
// Orchestrates the external OpenPGP service for the database engine:
//   1. `open_ciphertext()`: read the db file, decrypt it and check who signed it
//   2. `seal_plaintext()`:  resolve one key, sign + encrypt to it, no compression
//
// The gateway holds no signer/recipient state between calls. Every call
// resolves what it needs and hands it to the service explicitly.

use std::fmt;
use std::path::Path;

use zeroize::Zeroizing;

use super::CryptoError;

// ─── Types ───────────────────────────────────────────────────────────────────

/// OpenPGP validity tier of a single signature, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Validity {
    Unknown,
    Undefined,
    Never,
    Marginal,
    Full,
    Ultimate,
}

/// Whether the authenticity of the on-disk ciphertext could be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureStatus {
    /// Brand-new database that was never loaded from disk.
    #[default]
    Unknown,
    Valid,
    Invalid,
}

impl SignatureStatus {
    /// At least one signature at full validity or better makes the file valid.
    pub fn from_validities(validities: &[Validity]) -> Self {
        if validities.iter().any(|v| *v >= Validity::Full) {
            SignatureStatus::Valid
        } else {
            SignatureStatus::Invalid
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignatureStatus::Unknown => "unknown",
            SignatureStatus::Valid => "valid",
            SignatureStatus::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// A key the service resolved from a user-supplied key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    fingerprint: String,
}

impl KeyHandle {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Result of opening a ciphertext file.
pub struct Opened {
    pub cleartext: Zeroizing<Vec<u8>>,
    pub signature: SignatureStatus,
}

impl fmt::Debug for Opened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opened")
            .field("cleartext", &format_args!("[{} bytes REDACTED]", self.cleartext.len()))
            .field("signature", &self.signature)
            .finish()
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// The external OpenPGP implementation, reduced to the four calls the
/// store needs. Implementations must not keep signer or recipient state
/// between calls.
pub trait OpenPgpService {
    /// Decrypt and report the validity of every signature found.
    /// Fails if either step cannot be carried out.
    fn decrypt_and_verify(
        &self,
        ciphertext: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<Validity>), CryptoError>;

    /// Decrypt without looking at signatures.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Sign with `signer` and encrypt to `recipient` only, trusting the
    /// recipient unconditionally and without compressing the payload.
    fn encrypt_and_sign(
        &self,
        plaintext: &[u8],
        recipient: &KeyHandle,
        signer: &KeyHandle,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Look up exactly one key for `key_id`.
    fn resolve_key(&self, key_id: &str) -> Result<KeyHandle, CryptoError>;
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

pub struct CryptoGateway<S> {
    service: S,
}

impl<S: OpenPgpService> CryptoGateway<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Read the file at `path` and decrypt it.
    ///
    /// A broken or unverifiable signature does not stop decryption: the
    /// cleartext is still returned with `SignatureStatus::Invalid` and the
    /// caller must warn about it.
    pub fn open_ciphertext(
        &self,
        path: &Path,
        signer_hint: Option<&str>,
    ) -> Result<Opened, CryptoError> {
        let ciphertext = std::fs::read(path)?;

        let opened = match self.service.decrypt_and_verify(&ciphertext) {
            Ok((cleartext, validities)) => Opened {
                cleartext,
                signature: SignatureStatus::from_validities(&validities),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Signature check failed, retrying decryption without it");
                Opened {
                    cleartext: self.service.decrypt(&ciphertext)?,
                    signature: SignatureStatus::Invalid,
                }
            }
        };

        tracing::debug!(
            path = %path.display(),
            signer_hint = signer_hint.unwrap_or("-"),
            signature = %opened.signature,
            "Ciphertext opened"
        );

        Ok(opened)
    }

    /// Encrypt `plaintext` to `key_id`, signed by the same key.
    pub fn seal_plaintext(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>, CryptoError> {
        let key = self.service.resolve_key(key_id)?;
        let ciphertext = self.service.encrypt_and_sign(plaintext, &key, &key)?;
        tracing::debug!(fingerprint = %key.fingerprint(), "Plaintext sealed");
        Ok(ciphertext)
    }

    pub fn resolve_key(&self, key_id: &str) -> Result<KeyHandle, CryptoError> {
        self.service.resolve_key(key_id)
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MockPgp;
    use super::*;

    fn write_sealed(gateway: &CryptoGateway<MockPgp>, dir: &Path, key: &str) -> std::path::PathBuf {
        let path = dir.join("db");
        let sealed = gateway.seal_plaintext(b"{\"hello\":1}", key).unwrap();
        std::fs::write(&path, sealed).unwrap();
        path
    }

    #[test]
    fn test_full_validity_is_valid() {
        assert_eq!(
            SignatureStatus::from_validities(&[Validity::Marginal, Validity::Full]),
            SignatureStatus::Valid
        );
        assert_eq!(
            SignatureStatus::from_validities(&[Validity::Ultimate]),
            SignatureStatus::Valid
        );
    }

    #[test]
    fn test_below_full_or_no_signature_is_invalid() {
        assert_eq!(
            SignatureStatus::from_validities(&[Validity::Marginal, Validity::Never]),
            SignatureStatus::Invalid
        );
        assert_eq!(SignatureStatus::from_validities(&[]), SignatureStatus::Invalid);
    }

    #[test]
    fn test_seal_then_open_reports_valid_signature() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CryptoGateway::new(MockPgp::new().with_key("ABCDEF"));
        let path = write_sealed(&gateway, dir.path(), "ABCDEF");

        let opened = gateway.open_ciphertext(&path, Some("ABCDEF")).unwrap();
        assert_eq!(opened.cleartext.as_slice(), b"{\"hello\":1}");
        assert_eq!(opened.signature, SignatureStatus::Valid);
    }

    #[test]
    fn test_marginal_signer_still_decrypts_but_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CryptoGateway::new(
            MockPgp::new()
                .with_key("ABCDEF")
                .with_validity(Validity::Marginal),
        );
        let path = write_sealed(&gateway, dir.path(), "ABCDEF");

        let opened = gateway.open_ciphertext(&path, None).unwrap();
        assert_eq!(opened.cleartext.as_slice(), b"{\"hello\":1}");
        assert_eq!(opened.signature, SignatureStatus::Invalid);
    }

    #[test]
    fn test_verification_failure_falls_back_to_plain_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CryptoGateway::new(MockPgp::new().with_key("ABCDEF").failing_verification());
        let path = write_sealed(&gateway, dir.path(), "ABCDEF");

        let opened = gateway.open_ciphertext(&path, None).unwrap();
        assert_eq!(opened.cleartext.as_slice(), b"{\"hello\":1}");
        assert_eq!(
            opened.signature,
            SignatureStatus::Invalid,
            "Unverifiable files must load with an invalid signature status"
        );
    }

    #[test]
    fn test_garbage_ciphertext_is_decrypt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        std::fs::write(&path, b"definitely not OpenPGP").unwrap();

        let gateway = CryptoGateway::new(MockPgp::new().with_key("ABCDEF"));
        let err = gateway.open_ciphertext(&path, None).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt(_)), "got {:?}", err);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CryptoGateway::new(MockPgp::new());
        let err = gateway.open_ciphertext(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, CryptoError::Io(_)));
    }

    #[test]
    fn test_seal_with_unknown_key_is_key_resolution_error() {
        let gateway = CryptoGateway::new(MockPgp::new().with_key("ABCDEF"));
        let err = gateway.seal_plaintext(b"x", "123456").unwrap_err();
        assert!(err.is_key_resolution(), "got {:?}", err);
    }

    #[test]
    fn test_opened_debug_redacts_cleartext() {
        let opened = Opened {
            cleartext: Zeroizing::new(b"hunter2".to_vec()),
            signature: SignatureStatus::Valid,
        };
        let debug = format!("{:?}", opened);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
