//! Cryptographic Primitives Module
//!
//! Thin layer over the RustCrypto and x509-parser crates:
//! - Certificate parsing and issuer checks against trusted roots
//! - ECDSA P-256 signing keys and verification keys
//! - AES-256-GCM and the HMAC key schedule used for confidentiality

mod certificate;
mod keys;
pub mod symmetric;

pub use certificate::{Certificate, ID_LENGTH, party_id};
pub use keys::{PrivateKey, PublicKey};

use thiserror::Error;

/// Failures raised by the primitives themselves
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("failed parsing certificate: {0}")]
    CertificateParse(String),

    #[error("key type mismatch: expected ECDSA P-256, found {0}")]
    KeyTypeMismatch(String),

    #[error("malformed private key: {0}")]
    MalformedKey(String),

    #[error("malformed signature encoding")]
    MalformedSignature,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("secret: encryption failed")]
    Encryption,

    #[error("secret: decryption failed")]
    Decryption,
}
