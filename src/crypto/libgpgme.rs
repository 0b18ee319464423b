// Impass — GPGME backend
//
// Same `OpenPgpService` contract as the command-line backend, through the
// GPGME library. A fresh context is created per call.

use gpgme::{Context, EncryptFlags, Protocol};
use zeroize::Zeroizing;

use super::{CryptoError, KeyHandle, OpenPgpService, Validity};

/// `OpenPgpService` backed by libgpgme.
#[derive(Debug, Clone, Default)]
pub struct Gpgme;

impl Gpgme {
    pub fn new() -> Self {
        Self
    }

    fn context(&self) -> Result<Context, CryptoError> {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp)
            .map_err(|e| CryptoError::Service(e.to_string()))?;
        ctx.set_armor(true);
        Ok(ctx)
    }

    fn key(ctx: &mut Context, key_id: &str) -> Result<gpgme::Key, CryptoError> {
        ctx.get_key(key_id)
            .map_err(|_| CryptoError::KeyNotFound(key_id.to_string()))
    }
}

fn map_validity(validity: gpgme::Validity) -> Validity {
    match validity {
        gpgme::Validity::Ultimate => Validity::Ultimate,
        gpgme::Validity::Full => Validity::Full,
        gpgme::Validity::Marginal => Validity::Marginal,
        gpgme::Validity::Never => Validity::Never,
        gpgme::Validity::Undefined => Validity::Undefined,
        _ => Validity::Unknown,
    }
}

impl OpenPgpService for Gpgme {
    fn decrypt_and_verify(
        &self,
        ciphertext: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<Validity>), CryptoError> {
        let mut ctx = self.context()?;
        let mut plaintext = Zeroizing::new(Vec::new());
        let (_, verification) = ctx
            .decrypt_and_verify(ciphertext, &mut *plaintext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        let validities = verification
            .signatures()
            .map(|sig| map_validity(sig.validity()))
            .collect();
        Ok((plaintext, validities))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let mut ctx = self.context()?;
        let mut plaintext = Zeroizing::new(Vec::new());
        ctx.decrypt(ciphertext, &mut *plaintext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        Ok(plaintext)
    }

    fn encrypt_and_sign(
        &self,
        plaintext: &[u8],
        recipient: &KeyHandle,
        signer: &KeyHandle,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = self.context()?;
        let recipient_key = Self::key(&mut ctx, recipient.fingerprint())?;
        let signer_key = Self::key(&mut ctx, signer.fingerprint())?;
        ctx.add_signer(&signer_key)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut ciphertext = Vec::new();
        ctx.sign_and_encrypt_with_flags(
            Some(&recipient_key),
            plaintext,
            &mut ciphertext,
            EncryptFlags::ALWAYS_TRUST | EncryptFlags::NO_COMPRESS,
        )
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        Ok(ciphertext)
    }

    fn resolve_key(&self, key_id: &str) -> Result<KeyHandle, CryptoError> {
        let mut ctx = self.context()?;
        let key = Self::key(&mut ctx, key_id)?;
        let fingerprint = key
            .fingerprint()
            .map_err(|_| CryptoError::KeyNotFound(key_id.to_string()))?;
        Ok(KeyHandle::new(fingerprint))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
