use super::{CryptoError, PublicKey};
use p256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha384};
use x509_parser::oid_registry::{OID_KEY_TYPE_EC_PUBLIC_KEY, OID_SIG_ECDSA_WITH_SHA256, OID_SIG_ECDSA_WITH_SHA384};
use x509_parser::prelude::*;

/// Length of a party identifier (a SHA-384 digest)
pub const ID_LENGTH: usize = 48;

/// Identifier of the party holding the DER certificate `der`
pub fn party_id(der: &[u8]) -> [u8; ID_LENGTH] {
    let mut id = [0u8; ID_LENGTH];
    id.copy_from_slice(&Sha384::digest(der));
    id
}

/// Parsed X.509 certificate
///
/// Keeps the raw DER plus the pieces needed for signature verification and
/// issuer checks, so the value is owned and cheap to share behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    tbs_raw: Vec<u8>,
    signature_algorithm: String,
    signature: Vec<u8>,
    not_before: i64,
    not_after: i64,
    key_algorithm: String,
    key_bytes: Vec<u8>,
}

impl Certificate {
    /// Parse a DER-encoded certificate
    ///
    /// Succeeds for any well-formed certificate; the key algorithm is only
    /// checked when the key is extracted with [`Certificate::public_key`].
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| CryptoError::CertificateParse(e.to_string()))?;

        let spki = cert.public_key();
        let key_bytes: &[u8] = &spki.subject_public_key.data;
        let signature: &[u8] = &cert.signature_value.data;

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            subject_raw: cert.subject().as_raw().to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            tbs_raw: cert.tbs_certificate.as_ref().to_vec(),
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
            signature: signature.to_vec(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            key_algorithm: spki.algorithm.algorithm.to_id_string(),
            key_bytes: key_bytes.to_vec(),
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// SHA-384 of the DER encoding
    pub fn id(&self) -> [u8; ID_LENGTH] {
        party_id(&self.der)
    }

    /// Extract the subject public key. Only ECDSA P-256 keys are supported.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        if self.key_algorithm != OID_KEY_TYPE_EC_PUBLIC_KEY.to_id_string() {
            return Err(CryptoError::KeyTypeMismatch(self.key_algorithm.clone()));
        }
        let key = VerifyingKey::from_sec1_bytes(&self.key_bytes)
            .map_err(|_| CryptoError::KeyTypeMismatch(format!("{} (non P-256 curve)", self.key_algorithm)))?;
        Ok(PublicKey::EcdsaP256(key))
    }

    /// Whether `issuer` signed this certificate
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if self.issuer_raw != issuer.subject_raw {
            return false;
        }
        match issuer.public_key() {
            Ok(key) => verify_signed_data(&self.signature_algorithm, &key, &self.tbs_raw, &self.signature),
            Err(_) => false,
        }
    }

    /// Whether `at` (unix seconds) falls within the validity window
    pub fn is_valid_at(&self, at: i64) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Find the root among `roots` that issued this certificate. Both the
    /// certificate and the root must be valid at `at`.
    pub fn verify_against<'a>(&self, roots: &'a [Certificate], at: i64) -> Option<&'a Certificate> {
        if !self.is_valid_at(at) {
            return None;
        }
        roots
            .iter()
            .find(|root| root.is_valid_at(at) && self.is_issued_by(root))
    }
}

/// Check an X.509 signature made with `algorithm` (a dotted OID) over `data`
fn verify_signed_data(algorithm: &str, key: &PublicKey, data: &[u8], signature: &[u8]) -> bool {
    let verified = if algorithm == OID_SIG_ECDSA_WITH_SHA256.to_id_string() {
        key.verify(data, signature)
    } else if algorithm == OID_SIG_ECDSA_WITH_SHA384.to_id_string() {
        key.verify_prehash(&Sha384::digest(data), signature)
    } else {
        return false;
    };
    verified.unwrap_or(false)
}
