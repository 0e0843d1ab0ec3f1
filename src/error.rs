//! Error Module
//!
//! Every validator entry point returns [`Result`]. The variants are grouped
//! the way callers react to them: lifecycle misuse, structurally incomplete
//! transactions, cryptographic rejections, identity resolution and
//! infrastructure failures coming from collaborators.

use crate::crypto::CryptoError;
use crate::enrollment::DirectoryError;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Phase of `register` that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPhase {
    OpenStore,
    EcaChain,
    TcaChain,
    Enrollment,
    Persist,
}

impl fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            RegistrationPhase::OpenStore => "opening key storage",
            RegistrationPhase::EcaChain => "retrieving ECA certs chain",
            RegistrationPhase::TcaChain => "retrieving TCA certs chain",
            RegistrationPhase::Enrollment => "retrieving enrollment data",
            RegistrationPhase::Persist => "storing enrollment data",
        };
        f.write_str(phase)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    // Lifecycle
    #[error("validator not registered to the membership service")]
    NotRegistered,

    #[error("validator already registered to the membership service")]
    AlreadyRegistered,

    #[error("validator security module not initialized")]
    NotInitialized,

    #[error("validator security module already initialized")]
    AlreadyInitialized,

    #[error("registration failed while {phase}: {source}")]
    Registration {
        phase: RegistrationPhase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // Structural
    #[error("missing transaction certificate")]
    MissingCertificate,

    #[error("missing transaction signature")]
    MissingSignature,

    #[error("invalid encrypted payload: nil or empty")]
    MissingEncryptedPayload,

    #[error("invalid encrypted chaincode id: nil or empty")]
    MissingEncryptedChaincodeId,

    // Cryptographic
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid transaction signature")]
    InvalidTransactionSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("certificate [{0}] is not issued by a trusted root")]
    UntrustedCertificate(String),

    // Identity resolution
    #[error("enrollment certificate not found for [{0}]")]
    CertificateNotFound(String),

    // Infrastructure
    #[error("credential store: {0}")]
    Store(#[from] StoreError),

    #[error("certificate directory: {0}")]
    Directory(DirectoryError),

    #[error("transaction encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn registration<E>(phase: RegistrationPhase, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Registration {
            phase,
            source: source.into(),
        }
    }

    /// Whether the failure is a verdict on the input (as opposed to the
    /// validator or one of its collaborators misbehaving). The RPC surface
    /// reports the two kinds under different error codes.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::MissingCertificate
                | Error::MissingSignature
                | Error::MissingEncryptedPayload
                | Error::MissingEncryptedChaincodeId
                | Error::InvalidTransactionSignature
                | Error::InvalidSignature
                | Error::UntrustedCertificate(_)
                | Error::CertificateNotFound(_)
                | Error::Crypto(_)
        )
    }
}
