//! API Module
//!
//! This module handles the local JSON-RPC API through which peer logic
//! submits transactions for pre-validation and pre-execution, and requests
//! signatures and verifications.

mod server;
pub use server::{INTERNAL_ERROR, Server, VALIDATION_FAILED};
