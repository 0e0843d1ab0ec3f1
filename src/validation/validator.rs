use super::cache::CertificateCache;
use crate::config::SecurityConfig;
use crate::crypto::{Certificate, CryptoError, PrivateKey};
pub use crate::crypto::ID_LENGTH;
use crate::enrollment::{Authority, CertificateDirectory, EnrollmentClient};
use crate::error::{Error, RegistrationPhase, Result};
use crate::store::{CredentialStore, Credentials, StoreError};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

/// Collaborators a validator works with, owned by the instance rather than
/// the process
#[derive(Clone)]
pub struct ValidatorContext {
    pub store: Arc<dyn CredentialStore>,
    pub enrollment: Arc<dyn EnrollmentClient>,
    pub directory: Arc<dyn CertificateDirectory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unregistered,
    Registered,
    Initialized,
}

/// Enrollment material loaded by `init`, immutable afterwards
pub(crate) struct Identity {
    pub(crate) id: [u8; ID_LENGTH],
    pub(crate) enrollment_id: String,
    pub(crate) certificate: Certificate,
    pub(crate) key: PrivateKey,
    pub(crate) chain_key: Vec<u8>,
    pub(crate) trusted_roots: Vec<Certificate>,
}

impl Identity {
    fn from_credentials(credentials: Credentials) -> Result<Self> {
        let certificate = Certificate::from_der(&credentials.certificate)?;
        let key = PrivateKey::from_pkcs8_der(&credentials.private_key)?;
        if certificate.public_key()? != key.public_key() {
            return Err(CryptoError::MalformedKey("enrollment key does not match enrollment certificate".to_string()).into());
        }

        let trusted_roots = credentials
            .trusted_roots
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            id: certificate.id(),
            enrollment_id: credentials.enrollment_id,
            certificate,
            key,
            chain_key: credentials.chain_key,
            trusted_roots,
        })
    }

    /// Fails unless `certificate` was issued by one of the trusted roots and
    /// is currently valid
    pub(crate) fn ensure_trusted(&self, certificate: &Certificate) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        match certificate.verify_against(&self.trusted_roots, now) {
            Some(_) => Ok(()),
            None => Err(Error::UntrustedCertificate(certificate.subject().to_string())),
        }
    }
}

enum State {
    Unregistered,
    Registered,
    Initialized(Identity),
}

/// Security context of one validating peer
///
/// Lifecycle calls (`register`, `init`, `close`) take the state lock
/// exclusively. Validation, signing and verification hold it shared for
/// their whole duration, so they run concurrently with each other but never
/// with a lifecycle transition.
pub struct Validator {
    pub(crate) security: SecurityConfig,
    pub(crate) context: ValidatorContext,
    state: RwLock<State>,
    pub(crate) enrollment_certs: CertificateCache,
}

impl Validator {
    pub fn new(security: SecurityConfig, context: ValidatorContext) -> Self {
        Self {
            security,
            context,
            state: RwLock::new(State::Unregistered),
            enrollment_certs: CertificateCache::new(),
        }
    }

    /// Register this validator to the membership service.
    ///
    /// Fetches the ECA and TCA certificate chains, enrolls with `user_id` /
    /// `password` and persists the result. Nothing is written unless every
    /// phase succeeds, so a failed registration can simply be retried.
    /// A store that already holds credentials is never overwritten.
    pub async fn register(&self, user_id: &str, password: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !matches!(*state, State::Unregistered) {
            return Err(Error::AlreadyRegistered);
        }

        info!("Registering validator [{}]...", user_id);

        match self.context.store.open().await {
            Ok(()) | Err(StoreError::AlreadyOpen) => {}
            Err(e) => {
                error!("Failed creating key storage: {}", e);
                return Err(Error::registration(RegistrationPhase::OpenStore, e));
            }
        }
        match self.context.store.load_credentials().await {
            Ok(_) => {
                warn!("Key storage already holds enrollment data");
                return Err(Error::AlreadyRegistered);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(Error::registration(RegistrationPhase::OpenStore, e)),
        }

        let mut trusted_roots = self
            .fetch_chain(Authority::Enrollment)
            .await
            .map_err(|e| Error::registration(RegistrationPhase::EcaChain, e))?;
        trusted_roots.extend(
            self.fetch_chain(Authority::Transaction)
                .await
                .map_err(|e| Error::registration(RegistrationPhase::TcaChain, e))?,
        );

        let enrollment = self.context.enrollment.enroll(user_id, password).await.map_err(|e| {
            error!("Failed retrieving enrollment data: {}", e);
            Error::registration(RegistrationPhase::Enrollment, e)
        })?;
        let credentials = Credentials {
            enrollment_id: user_id.to_string(),
            certificate: enrollment.certificate,
            private_key: enrollment.private_key,
            chain_key: enrollment.chain_key,
            trusted_roots,
        };
        // Refuse to persist material init could not load
        Identity::from_credentials(credentials.clone())
            .map_err(|e| Error::registration(RegistrationPhase::Enrollment, e))?;

        self.context
            .store
            .save_credentials(&credentials)
            .await
            .map_err(|e| Error::registration(RegistrationPhase::Persist, e))?;

        *state = State::Registered;
        info!("Registering validator [{}]...done!", user_id);
        Ok(())
    }

    async fn fetch_chain(
        &self,
        authority: Authority,
    ) -> std::result::Result<Vec<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        let chain = self.context.enrollment.fetch_ca_chain(authority).await.map_err(|e| {
            error!("Failed retrieving {} certs chain: {}", authority, e);
            e
        })?;
        if chain.is_empty() {
            return Err(format!("{} returned an empty certificate chain", authority).into());
        }
        for der in &chain {
            Certificate::from_der(der)?;
        }
        Ok(chain)
    }

    /// Load the credentials created at registration time.
    ///
    /// Must succeed before any other call; until then every operation
    /// returns [`Error::NotInitialized`].
    pub async fn init(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if matches!(*state, State::Initialized(_)) {
            return Err(Error::AlreadyInitialized);
        }

        info!("Init DB...");
        match self.context.store.open().await {
            Ok(()) => {}
            Err(StoreError::AlreadyOpen) => debug!("DB already initialized"),
            Err(e) => {
                error!("Failed initializing DB: {}", e);
                return Err(e.into());
            }
        }
        info!("Init DB...done.");

        info!("Init crypto engine...");
        let credentials = match self.context.store.load_credentials().await {
            Ok(credentials) => credentials,
            Err(StoreError::NotFound) => return Err(Error::NotRegistered),
            Err(e) => {
                error!("Failed loading enrollment data: {}", e);
                return Err(e.into());
            }
        };
        let identity = Identity::from_credentials(credentials).map_err(|e| {
            error!("Failed initializing crypto engine: {}", e);
            e
        })?;
        info!(
            "Init crypto engine...done. Validator [{}] id [{}]",
            identity.enrollment_id,
            hex::encode(identity.id)
        );

        *state = State::Initialized(identity);
        Ok(())
    }

    /// Release the credential store. Does not change the lifecycle phase.
    pub async fn close(&self) -> Result<()> {
        let _state = self.state.write().await;
        self.context.store.close().await?;
        info!("Validator closed");
        Ok(())
    }

    pub async fn phase(&self) -> LifecyclePhase {
        match *self.state.read().await {
            State::Unregistered => LifecyclePhase::Unregistered,
            State::Registered => LifecyclePhase::Registered,
            State::Initialized(_) => LifecyclePhase::Initialized,
        }
    }

    /// This validator's 48-byte identifier
    pub async fn id(&self) -> Result<[u8; ID_LENGTH]> {
        Ok(self.identity().await?.id)
    }

    pub async fn enrollment_id(&self) -> Result<String> {
        Ok(self.identity().await?.enrollment_id.clone())
    }

    /// Whether `der` is one of the root certificates stored at registration
    pub async fn trusts_root(&self, der: &[u8]) -> Result<bool> {
        let identity = self.identity().await?;
        Ok(identity.trusted_roots.iter().any(|root| root.der() == der))
    }

    /// DER enrollment certificate, for use as a transaction certificate
    pub async fn enrollment_certificate(&self) -> Result<Vec<u8>> {
        Ok(self.identity().await?.certificate.der().to_vec())
    }

    pub(crate) async fn identity(&self) -> Result<RwLockReadGuard<'_, Identity>> {
        RwLockReadGuard::try_map(self.state.read().await, |state| match state {
            State::Initialized(identity) => Some(identity),
            State::Unregistered | State::Registered => None,
        })
        .map_err(|_| Error::NotInitialized)
    }
}
