//! Enrollment Module
//!
//! Contracts for the membership-service collaborators:
//! - [`EnrollmentClient`]: certificate chains of the Enrollment CA and
//!   Transaction CA, and the enrollment handshake itself
//! - [`CertificateDirectory`]: enrollment certificates of other parties
//!
//! [`LocalAuthority`] implements both in process, for development networks
//! and tests.

mod local;

pub use local::LocalAuthority;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Certificate authorities a validator fetches chains from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Enrollment CA
    Enrollment,
    /// Transaction CA
    Transaction,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Enrollment => f.write_str("ECA"),
            Authority::Transaction => f.write_str("TCA"),
        }
    }
}

/// Material issued by a successful enrollment
#[derive(Clone)]
pub struct Enrollment {
    /// DER enrollment certificate
    pub certificate: Vec<u8>,
    /// PKCS#8 DER private key
    pub private_key: Vec<u8>,
    pub chain_key: Vec<u8>,
}

impl fmt::Debug for Enrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enrollment")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("enrollment rejected for [{0}]: bad credentials")]
    Rejected(String),

    #[error("{0} unavailable: {1}")]
    Unavailable(Authority, String),

    #[error("certificate issuance failed: {0}")]
    Issuance(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no enrollment certificate for [{0}]")]
    NotFound(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EnrollmentClient: Send + Sync {
    /// DER certificate chain of `authority`, root first
    async fn fetch_ca_chain(&self, authority: Authority) -> Result<Vec<Vec<u8>>, EnrollmentError>;

    async fn enroll(&self, user_id: &str, password: &str) -> Result<Enrollment, EnrollmentError>;
}

#[async_trait]
pub trait CertificateDirectory: Send + Sync {
    /// DER enrollment certificate of `party_id`, the SHA-384 of that
    /// certificate (see [`crate::crypto::party_id`])
    async fn lookup_certificate(&self, party_id: &[u8]) -> Result<Vec<u8>, DirectoryError>;
}
