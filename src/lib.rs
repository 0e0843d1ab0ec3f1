//! This crate implements the security core of a permissioned-ledger validator.
//! It covers enrollment with the membership service, pre-validation and
//! pre-execution of transactions, and signing and verification under the
//! validator's enrollment key.

pub mod types; // Transaction and its wire form.
pub mod api; // Local JSON-RPC surface for co-located peer logic.
pub mod validation; // Lifecycle, transaction checks, signing and verification.
pub mod crypto; // Certificates, ECDSA keys and symmetric primitives.
pub mod store; // Credential persistence.
pub mod enrollment; // Membership service clients and the certificate directory.
pub mod error; // Validator error taxonomy.
pub mod config; // Defines and loads validator configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use error::{Error, Result};
pub use validation::Validator;
