use super::{Authority, CertificateDirectory, DirectoryError, Enrollment, EnrollmentClient, EnrollmentError};
use crate::crypto::party_id;
use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, KeyUsagePurpose,
    PKCS_ECDSA_P256_SHA256,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

const CHAIN_KEY_LENGTH: usize = 32;

struct Issuer {
    certificate: rcgen::Certificate,
    key: KeyPair,
}

impl Issuer {
    fn new_root(common_name: &str) -> Result<Self, rcgen::Error> {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.distinguished_name.push(DnType::OrganizationName, "obc");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];

        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
        let certificate = params.self_signed(&key)?;
        Ok(Self { certificate, key })
    }

    fn issue(&self, common_name: &str, subject_key: &KeyPair) -> Result<Vec<u8>, rcgen::Error> {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

        let certificate = params.signed_by(subject_key, &self.certificate, &self.key)?;
        Ok(certificate.der().to_vec())
    }
}

/// In-process Enrollment CA, Transaction CA and certificate directory
///
/// Every enrollment receives the same chain key, as all members of a
/// network share it for confidentiality.
pub struct LocalAuthority {
    eca: Issuer,
    tca: Issuer,
    chain_key: Vec<u8>,
    /// enrollment id -> password
    users: RwLock<HashMap<String, String>>,
    /// party id -> DER enrollment certificate
    issued: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl LocalAuthority {
    pub fn new() -> Result<Self, EnrollmentError> {
        let eca = Issuer::new_root("obc-eca").map_err(|e| EnrollmentError::Issuance(e.to_string()))?;
        let tca = Issuer::new_root("obc-tca").map_err(|e| EnrollmentError::Issuance(e.to_string()))?;

        let mut chain_key = vec![0u8; CHAIN_KEY_LENGTH];
        OsRng.fill_bytes(&mut chain_key);

        Ok(Self {
            eca,
            tca,
            chain_key,
            users: RwLock::new(HashMap::new()),
            issued: RwLock::new(HashMap::new()),
        })
    }

    /// Allow `user_id` to enroll with `password`
    pub async fn register_user(&self, user_id: impl Into<String>, password: impl Into<String>) {
        self.users.write().await.insert(user_id.into(), password.into());
    }

    /// Network chain key, as handed out at enrollment
    pub fn chain_key(&self) -> &[u8] {
        &self.chain_key
    }

    /// Issue an enrollment certificate for `enrollment_id` over `subject_key`
    /// and publish it in the directory under its party id.
    pub async fn issue_enrollment_certificate(
        &self,
        enrollment_id: &str,
        subject_key: &KeyPair,
    ) -> Result<Vec<u8>, EnrollmentError> {
        let der = self
            .eca
            .issue(enrollment_id, subject_key)
            .map_err(|e| EnrollmentError::Issuance(e.to_string()))?;
        self.issued.write().await.insert(party_id(&der).to_vec(), der.clone());
        Ok(der)
    }

    /// Issue an anonymous transaction certificate over `subject_key`
    pub fn issue_transaction_certificate(&self, subject_key: &KeyPair) -> Result<Vec<u8>, EnrollmentError> {
        self.tca
            .issue("tcert", subject_key)
            .map_err(|e| EnrollmentError::Issuance(e.to_string()))
    }
}

#[async_trait]
impl EnrollmentClient for LocalAuthority {
    async fn fetch_ca_chain(&self, authority: Authority) -> Result<Vec<Vec<u8>>, EnrollmentError> {
        let issuer = match authority {
            Authority::Enrollment => &self.eca,
            Authority::Transaction => &self.tca,
        };
        Ok(vec![issuer.certificate.der().to_vec()])
    }

    async fn enroll(&self, user_id: &str, password: &str) -> Result<Enrollment, EnrollmentError> {
        let authorized = self.users.read().await.get(user_id).is_some_and(|expected| expected == password);
        if !authorized {
            warn!("Rejected enrollment for [{}]", user_id);
            return Err(EnrollmentError::Rejected(user_id.to_string()));
        }

        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(|e| EnrollmentError::Issuance(e.to_string()))?;
        let certificate = self.issue_enrollment_certificate(user_id, &key).await?;
        info!("Enrolled [{}]", user_id);

        Ok(Enrollment {
            certificate,
            private_key: key.serialize_der(),
            chain_key: self.chain_key.clone(),
        })
    }
}

#[async_trait]
impl CertificateDirectory for LocalAuthority {
    async fn lookup_certificate(&self, party_id: &[u8]) -> Result<Vec<u8>, DirectoryError> {
        self.issued
            .read()
            .await
            .get(party_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(hex::encode(party_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Certificate, PrivateKey};

    #[tokio::test]
    async fn enrollment_requires_password() {
        let authority = LocalAuthority::new().unwrap();
        authority.register_user("alice", "secret").await;

        assert!(matches!(
            authority.enroll("alice", "wrong").await,
            Err(EnrollmentError::Rejected(_))
        ));
        assert!(matches!(
            authority.enroll("mallory", "secret").await,
            Err(EnrollmentError::Rejected(_))
        ));
        assert!(authority.enroll("alice", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn enrollment_material_is_consistent() {
        let authority = LocalAuthority::new().unwrap();
        authority.register_user("alice", "secret").await;
        let enrollment = authority.enroll("alice", "secret").await.unwrap();

        let cert = Certificate::from_der(&enrollment.certificate).unwrap();
        let key = PrivateKey::from_pkcs8_der(&enrollment.private_key).unwrap();
        assert_eq!(cert.public_key().unwrap(), key.public_key());
        assert_eq!(enrollment.chain_key, authority.chain_key());

        let eca = authority.fetch_ca_chain(Authority::Enrollment).await.unwrap();
        let eca = Certificate::from_der(&eca[0]).unwrap();
        assert!(cert.is_issued_by(&eca));
    }

    #[tokio::test]
    async fn directory_serves_issued_certificates() {
        let authority = LocalAuthority::new().unwrap();
        authority.register_user("bob", "pw").await;
        let enrollment = authority.enroll("bob", "pw").await.unwrap();

        let id = party_id(&enrollment.certificate);
        assert_eq!(authority.lookup_certificate(&id).await.unwrap(), enrollment.certificate);

        let unknown = [7u8; 48];
        assert!(matches!(
            authority.lookup_certificate(&unknown).await,
            Err(DirectoryError::NotFound(id)) if id == hex::encode(unknown)
        ));
        // Enrollment ids are not party ids
        assert!(authority.lookup_certificate(b"bob").await.is_err());
    }

    #[tokio::test]
    async fn transaction_certificates_chain_to_tca() {
        let authority = LocalAuthority::new().unwrap();
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let tcert = Certificate::from_der(&authority.issue_transaction_certificate(&key).unwrap()).unwrap();

        let tca = authority.fetch_ca_chain(Authority::Transaction).await.unwrap();
        let eca = authority.fetch_ca_chain(Authority::Enrollment).await.unwrap();
        assert!(tcert.is_issued_by(&Certificate::from_der(&tca[0]).unwrap()));
        assert!(!tcert.is_issued_by(&Certificate::from_der(&eca[0]).unwrap()));
    }
}
