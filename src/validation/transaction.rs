use super::confidentiality;
use super::validator::Validator;
use crate::crypto::Certificate;
use crate::error::{Error, Result};
use crate::types::{ConfidentialityLevel, Transaction};
use tracing::{debug, error, warn};

impl Validator {
    /// Check that `tx` is well formed for the security layer: certificate
    /// and signature present, signature valid over the canonical form and,
    /// for confidential transactions, both encrypted fields present.
    ///
    /// Does not decrypt anything; see [`Validator::transaction_pre_execution`].
    pub async fn transaction_pre_validation(&self, tx: &Transaction) -> Result<()> {
        let identity = self.identity().await?;

        // Certificate first, so a transaction missing both reports the certificate
        if tx.cert.is_empty() {
            return Err(Error::MissingCertificate);
        }
        if tx.signature.is_empty() {
            return Err(Error::MissingSignature);
        }

        debug!("Validating signature of transaction [{}]...", tx.uuid);

        let cert = Certificate::from_der(&tx.cert).map_err(|e| {
            warn!("Failed unmarshalling cert of transaction [{}]: {}", tx.uuid, e);
            e
        })?;
        if self.security.verify_certificate_chains {
            identity.ensure_trusted(&cert)?;
        }

        let raw = tx.canonical_bytes()?;
        let verified = cert.public_key()?.verify(&raw, &tx.signature).map_err(|e| {
            warn!("Failed verifying signature of transaction [{}]: {}", tx.uuid, e);
            e
        })?;
        if !verified {
            warn!("Invalid signature on transaction [{}]", tx.uuid);
            return Err(Error::InvalidTransactionSignature);
        }

        match tx.confidentiality_level {
            ConfidentialityLevel::Public => {}
            ConfidentialityLevel::Confidential => check_encrypted_fields(tx)?,
        }

        debug!("Validating signature of transaction [{}]...done", tx.uuid);
        Ok(())
    }

    /// Prepare a pre-validated transaction for execution.
    ///
    /// Public transactions pass through untouched. Confidential ones get
    /// their payload and chaincode id decrypted into the plaintext fields.
    pub async fn transaction_pre_execution(&self, tx: Transaction) -> Result<Transaction> {
        let identity = self.identity().await?;

        match tx.confidentiality_level {
            ConfidentialityLevel::Public => Ok(tx),
            ConfidentialityLevel::Confidential => {
                check_encrypted_fields(&tx)?;
                let uuid = tx.uuid.clone();
                confidentiality::open_transaction(&identity.chain_key, tx).map_err(|e| {
                    error!("Failed decrypting transaction [{}]: {}", uuid, e);
                    e.into()
                })
            }
        }
    }
}

fn check_encrypted_fields(tx: &Transaction) -> Result<()> {
    if tx.encrypted_payload.is_empty() {
        return Err(Error::MissingEncryptedPayload);
    }
    if tx.encrypted_chaincode_id.is_empty() {
        return Err(Error::MissingEncryptedChaincodeId);
    }
    Ok(())
}
