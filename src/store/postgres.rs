//! PostgreSQL-backed session store
//!
//! Every operation is a single statement so that row-level locking gives the
//! per-key atomicity the trait requires. Expiry is judged by the database
//! clock only.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{SessionStore, StoreError};

/// Attempts at claiming a key whose holder expires mid-call.
const CLAIM_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value FROM session_kv
            WHERE key = $1 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_kv (key, value, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        for _ in 0..CLAIM_ATTEMPTS {
            // Inserts, or takes over an expired row; a live row is left alone
            let claimed = sqlx::query_scalar::<_, String>(
                r#"
                INSERT INTO session_kv (key, value, expires_at)
                VALUES ($1, $2, NOW() + make_interval(secs => $3))
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
                WHERE session_kv.expires_at <= NOW()
                RETURNING value
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(ttl.as_secs_f64())
            .fetch_optional(&self.pool)
            .await?;

            if let Some(claimed) = claimed {
                return Ok(claimed);
            }

            if let Some(existing) = self.get(key).await? {
                return Ok(existing);
            }
        }

        Err(StoreError::Backend(format!(
            "could not claim key {} after {} attempts",
            key, CLAIM_ATTEMPTS
        )))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let deleted = sqlx::query_scalar::<_, bool>(
            r#"
            DELETE FROM session_kv
            WHERE key = $1
            RETURNING expires_at > NOW()
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deleted.unwrap_or(false))
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM session_kv
            WHERE key = $1 AND value = $2 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .bind(expected)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query("DELETE FROM session_kv WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
