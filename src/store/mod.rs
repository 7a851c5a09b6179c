//! Session store
//!
//! TTL-bound key-value storage shared by the nonce manager and the session
//! layer. Implementations must make every compound operation atomic per key.

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors. These are infrastructure failures, never client mistakes.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Session store query failed: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Write `value` only if no live entry exists. Returns the live value
    /// after the call, which is the existing one when the key was taken.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<String, StoreError>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove `key` only if its live value equals `expected`.
    ///
    /// Exactly one of any number of concurrent callers observes `true`.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Drop expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    /// Connectivity check for health probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Periodically purge expired entries until the task is dropped.
pub async fn run_sweeper(store: std::sync::Arc<dyn SessionStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Purged expired session store entries"),
            Err(e) => tracing::error!(error = %e, "Failed to purge expired session store entries"),
        }
    }
}
