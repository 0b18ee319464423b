// Impass — Crypto Module
//
// The only place that talks to an OpenPGP implementation. The database
// engine sees a stateless `CryptoGateway` that decrypts+verifies on load
// and signs+encrypts on save; the actual primitives live behind the
// `OpenPgpService` trait (GnuPG binary by default, libgpgme on request).

mod error;
mod gateway;
mod gpg;
#[cfg(feature = "gpgme")]
mod libgpgme;

pub use error::CryptoError;
pub use gateway::{CryptoGateway, KeyHandle, OpenPgpService, Opened, SignatureStatus, Validity};
pub use gpg::GpgCommand;
#[cfg(feature = "gpgme")]
pub use libgpgme::Gpgme;

#[cfg(test)]
pub use gateway::mock;
