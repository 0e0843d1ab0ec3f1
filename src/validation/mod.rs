//! Transaction Validation Module
//!
//! This module holds the validator security context:
//! - Lifecycle: register with the membership service, init from stored credentials, close
//! - Pre-validation: certificate and signature checks, confidential field completeness
//! - Pre-execution: decryption of confidential transactions
//! - Signing and verification of arbitrary messages

mod cache;
pub mod confidentiality;
mod signing;
mod transaction;
mod validator;


pub use cache::CertificateCache;
pub use validator::{ID_LENGTH, LifecyclePhase, Validator, ValidatorContext};
