//! Credential Store Module
//!
//! Durable storage for the validator's enrollment material:
//! - Enrollment certificate and PKCS#8 private key
//! - Enrollment chain key
//! - Trusted root certificates (ECA and TCA chains)
//!
//! The validator only talks to the [`CredentialStore`] trait; the SQLite
//! implementation is what the binary wires in.

mod sqlite;

pub use sqlite::SqliteCredentialStore;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store already open")]
    AlreadyOpen,

    #[error("store not open")]
    NotOpen,

    #[error("no credentials stored")]
    NotFound,

    #[error("stored credentials are corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Backend(#[from] sqlx::Error),
}

/// Everything enrollment hands back, as persisted
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub enrollment_id: String,
    /// DER enrollment certificate
    pub certificate: Vec<u8>,
    /// PKCS#8 DER private key
    pub private_key: Vec<u8>,
    pub chain_key: Vec<u8>,
    /// DER root certificates, ECA chain first
    pub trusted_roots: Vec<Vec<u8>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("enrollment_id", &self.enrollment_id)
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .field("chain_key", &"<redacted>")
            .field("trusted_roots", &self.trusted_roots.len())
            .finish()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Open the backing storage, creating it if needed.
    ///
    /// Returns [`StoreError::AlreadyOpen`] when called on an open store.
    async fn open(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;

    async fn load_credentials(&self) -> Result<Credentials, StoreError>;

    /// Replace any stored credentials atomically
    async fn save_credentials(&self, credentials: &Credentials) -> Result<(), StoreError>;
}
