use obc_validator::{
    Error, Validator,
    api::Server,
    config::Config,
    enrollment::{Authority, EnrollmentClient, LocalAuthority},
    store::SqliteCredentialStore,
    validation::ValidatorContext,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The main entry point for the validator.
///
/// Loads the configuration, brings the validator to the initialized state
/// (registering with the membership service on first start), serves the
/// local API until ctrl-c and finally closes the credential store.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("Validator starting with config: {:?}", config);

    // In-process membership service standing in for the ECA/TCA
    let authority = Arc::new(LocalAuthority::new()?);
    authority
        .register_user(&config.validator.enrollment_id, &config.validator.enrollment_secret)
        .await;

    let store = Arc::new(SqliteCredentialStore::new(&config.store.url));
    let validator = Arc::new(Validator::new(
        config.security.clone(),
        ValidatorContext {
            store,
            enrollment: authority.clone(),
            directory: authority.clone(),
        },
    ));

    match validator.init().await {
        Ok(()) => {}
        Err(Error::NotRegistered) => {
            info!("No stored credentials, registering [{}]", config.validator.enrollment_id);
            validator
                .register(&config.validator.enrollment_id, &config.validator.enrollment_secret)
                .await?;
            validator.init().await?;
        }
        Err(e) => return Err(e.into()),
    }
    info!("Validator [{}] ready", hex::encode(validator.id().await?));

    // The local authority mints fresh CA keys per process; credentials stored
    // by an earlier run keep that run's roots
    for kind in [Authority::Enrollment, Authority::Transaction] {
        let chain = authority.fetch_ca_chain(kind).await?;
        for root in &chain {
            if !validator.trusts_root(root).await? {
                warn!(
                    "{} root of this process is not a stored trusted root; certificates it issues will be rejected",
                    kind
                );
                break;
            }
        }
    }

    let server = Server::new(config.api.clone(), validator.clone());
    server
        .start(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    validator.close().await?;
    Ok(())
}
