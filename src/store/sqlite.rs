use super::{CredentialStore, Credentials, StoreError};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info};

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS credentials (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        enrollment_id TEXT NOT NULL,
        certificate BLOB NOT NULL,
        private_key BLOB NOT NULL,
        chain_key BLOB NOT NULL,
        registered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS trusted_roots (
        position INTEGER PRIMARY KEY,
        certificate BLOB NOT NULL
    )",
];

/// Credential store backed by a single SQLite database
///
/// The pool is created by `open` and dropped by `close`; any other call on a
/// closed store fails with [`StoreError::NotOpen`].
pub struct SqliteCredentialStore {
    /// sqlx connection URL (e.g. "sqlite://validator.db" or "sqlite::memory:")
    url: String,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteCredentialStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: RwLock::new(None),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.pool.read().await.is_some()
    }

    async fn pool(&self) -> Result<SqlitePool, StoreError> {
        self.pool.read().await.clone().ok_or(StoreError::NotOpen)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn open(&self) -> Result<(), StoreError> {
        let mut guard = self.pool.write().await;
        if guard.is_some() {
            return Err(StoreError::AlreadyOpen);
        }

        let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection
        let pool = if self.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(4).connect_with(options).await?
        };

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!("Credential store opened at {}", self.url);
        *guard = Some(pool);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            debug!("Credential store closed");
        }
        Ok(())
    }

    async fn load_credentials(&self) -> Result<Credentials, StoreError> {
        let pool = self.pool().await?;

        let row = sqlx::query(
            "SELECT enrollment_id, certificate, private_key, chain_key FROM credentials WHERE id = 1",
        )
        .fetch_optional(&pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        let roots = sqlx::query("SELECT certificate FROM trusted_roots ORDER BY position")
            .fetch_all(&pool)
            .await?;

        let credentials = Credentials {
            enrollment_id: row.try_get("enrollment_id")?,
            certificate: row.try_get("certificate")?,
            private_key: row.try_get("private_key")?,
            chain_key: row.try_get("chain_key")?,
            trusted_roots: roots
                .iter()
                .map(|root| root.try_get("certificate"))
                .collect::<Result<_, _>>()?,
        };

        if credentials.certificate.is_empty() || credentials.private_key.is_empty() {
            return Err(StoreError::Corrupt("empty enrollment certificate or key".to_string()));
        }

        Ok(credentials)
    }

    async fn save_credentials(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO credentials
                (id, enrollment_id, certificate, private_key, chain_key, registered_at)
             VALUES (1, ?, ?, ?, ?, ?)",
        )
        .bind(&credentials.enrollment_id)
        .bind(&credentials.certificate)
        .bind(&credentials.private_key)
        .bind(&credentials.chain_key)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM trusted_roots").execute(&mut *tx).await?;
        for (position, root) in credentials.trusted_roots.iter().enumerate() {
            sqlx::query("INSERT INTO trusted_roots (position, certificate) VALUES (?, ?)")
                .bind(position as i64)
                .bind(root)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Stored credentials for [{}]", credentials.enrollment_id);
        Ok(())
    }
}
