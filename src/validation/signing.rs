use super::validator::{Identity, Validator};
use crate::crypto::Certificate;
use crate::enrollment::DirectoryError;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

impl Validator {
    /// Sign `message` with this validator's enrollment key
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let identity = self.identity().await?;
        Ok(identity.key.sign(message)?)
    }

    /// Check that `signature` is a valid signature of `message` under the
    /// enrollment key of `verifier_id`.
    ///
    /// `None`, an empty id or this validator's own [`Validator::id`] verify
    /// against its own key. Other party ids are looked up in the directory and
    /// the certificates cached.
    /// Both a mismatch and an undecodable signature yield
    /// [`Error::InvalidSignature`].
    pub async fn verify(&self, verifier_id: Option<&[u8]>, signature: &[u8], message: &[u8]) -> Result<()> {
        let identity = self.identity().await?;

        let key = match verifier_id {
            None | Some([]) => identity.certificate.public_key()?,
            Some(party_id) if party_id == identity.id.as_slice() => identity.certificate.public_key()?,
            Some(party_id) => self.enrollment_certificate_of(&identity, party_id).await?.public_key()?,
        };
        let label = verifier_id.map(hex::encode).unwrap_or_else(|| "self".to_string());

        match key.verify(message, signature) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("Invalid signature for [{}]", label);
                Err(Error::InvalidSignature)
            }
            // An undecodable signature is not a valid one
            Err(e) => {
                warn!("Failed verifying signature for [{}]: {}", label, e);
                Err(Error::InvalidSignature)
            }
        }
    }

    async fn enrollment_certificate_of(&self, identity: &Identity, party_id: &[u8]) -> Result<Arc<Certificate>> {
        self.enrollment_certs
            .get_or_fetch(party_id, move || async move {
                debug!("Fetching enrollment certificate for [{}]", hex::encode(party_id));
                let der = self
                    .context
                    .directory
                    .lookup_certificate(party_id)
                    .await
                    .map_err(|e| match e {
                        DirectoryError::NotFound(_) => Error::CertificateNotFound(hex::encode(party_id)),
                        other => Error::Directory(other),
                    })?;
                let certificate = Certificate::from_der(&der)?;
                if self.security.verify_certificate_chains {
                    identity.ensure_trusted(&certificate)?;
                }
                Ok::<_, Error>(certificate)
            })
            .await
    }
}
