//! Database connection, migrations and backend selection

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::profile::{MemoryProfileRepository, PgProfileRepository, ProfileRepository};
use crate::store::{MemoryStore, PgStore, SessionStore};

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Create a database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Check database connectivity
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}

/// Storage backends used by the services
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn SessionStore>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Backends {
    /// In-process backends. State is lost on restart.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            profiles: Arc::new(MemoryProfileRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            store: Arc::new(PgStore::new(pool.clone())),
            profiles: Arc::new(PgProfileRepository::new(pool)),
        }
    }

    /// Postgres when `DATABASE_URL` is set, in-memory otherwise.
    ///
    /// A configured database that cannot be reached or migrated is a
    /// startup failure.
    pub async fn from_config(config: &Config) -> Result<Self, DbError> {
        match (&config.database_url, config.database_url_masked()) {
            (Some(url), Some(masked)) => {
                tracing::info!("Connecting to database at {}", masked);
                let pool = create_pool(url, config.db_max_connections).await?;
                run_migrations(&pool).await?;
                check_health(&pool).await?;
                Ok(Self::postgres(pool))
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory session store and profiles");
                Ok(Self::in_memory())
            }
        }
    }
}
