//! Single-use challenge nonces
//!
//! One live nonce per address. Issuing is idempotent while the nonce lives;
//! consuming deletes it through the store's atomic delete-if-match so a nonce
//! can never be consumed twice.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::address::WalletAddress;
use crate::store::{SessionStore, StoreError};

/// Six decimal digits: 900,000 possible values.
pub const NONCE_RANGE: RangeInclusive<u32> = 100_000..=999_999;

/// Nonce lifecycle errors
#[derive(Error, Debug, Clone)]
pub enum NonceError {
    #[error("Nonce not found or expired")]
    NotFound,

    #[error("Nonce does not match the outstanding challenge")]
    Mismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues and consumes challenge nonces
#[derive(Clone)]
pub struct NonceManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl NonceManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(address: &WalletAddress) -> String {
        format!("nonce:{}", address.as_str())
    }

    /// Return the live nonce for `address`, issuing one if none exists.
    pub async fn issue_or_get(&self, address: &WalletAddress) -> Result<u32, NonceError> {
        let candidate = rand::thread_rng().gen_range(NONCE_RANGE);
        let live = self
            .store
            .set_if_absent(&Self::key(address), &candidate.to_string(), self.ttl)
            .await?;

        let nonce = parse_stored(&live)?;
        if nonce == candidate {
            tracing::info!(address = %address, nonce, "Issued new nonce");
        } else {
            tracing::info!(address = %address, nonce, "Reusing outstanding nonce");
        }
        Ok(nonce)
    }

    /// Live nonce for `address` without issuing one.
    pub async fn peek(&self, address: &WalletAddress) -> Result<Option<u32>, NonceError> {
        match self.store.get(&Self::key(address)).await? {
            Some(stored) => Ok(Some(parse_stored(&stored)?)),
            None => Ok(None),
        }
    }

    /// Check `presented` against the live nonce without consuming it.
    pub async fn check(&self, address: &WalletAddress, presented: u32) -> Result<(), NonceError> {
        let stored = self.peek(address).await?.ok_or_else(|| {
            tracing::warn!(address = %address, "Nonce not found or expired");
            NonceError::NotFound
        })?;

        if stored != presented {
            tracing::warn!(
                address = %address,
                expected = stored,
                presented,
                "Nonce mismatch"
            );
            return Err(NonceError::Mismatch);
        }

        Ok(())
    }

    /// Consume the live nonce if it equals `presented`.
    ///
    /// Of any number of concurrent calls with the right value, exactly one
    /// succeeds; the rest observe `NotFound`.
    pub async fn consume(&self, address: &WalletAddress, presented: u32) -> Result<(), NonceError> {
        self.check(address, presented).await?;

        let deleted = self
            .store
            .delete_if_eq(&Self::key(address), &presented.to_string())
            .await?;

        if !deleted {
            tracing::warn!(address = %address, nonce = presented, "Nonce consumed concurrently");
            return Err(NonceError::NotFound);
        }

        tracing::debug!(address = %address, nonce = presented, "Nonce consumed");
        Ok(())
    }
}

fn parse_stored(raw: &str) -> Result<u32, NonceError> {
    raw.parse::<u32>()
        .map_err(|_| NonceError::Store(StoreError::Backend(format!("corrupt nonce value {:?}", raw))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> (NonceManager, MemoryStore) {
        let store = MemoryStore::new();
        let manager = NonceManager::new(Arc::new(store.clone()), Duration::from_secs(300));
        (manager, store)
    }

    fn address() -> WalletAddress {
        WalletAddress::parse("0xabc0000000000000000000000000000000000123").unwrap()
    }

    #[tokio::test]
    async fn test_issue_is_idempotent() {
        let (manager, _) = manager();
        let first = manager.issue_or_get(&address()).await.unwrap();
        let second = manager.issue_or_get(&address()).await.unwrap();

        assert_eq!(first, second);
        assert!(NONCE_RANGE.contains(&first));
    }

    #[tokio::test]
    async fn test_case_variants_share_one_nonce() {
        let (manager, store) = manager();
        let lower = WalletAddress::parse("0xabcdef0000000000000000000000000000000123").unwrap();
        let upper = WalletAddress::parse("0xABCDEF0000000000000000000000000000000123").unwrap();

        let a = manager.issue_or_get(&lower).await.unwrap();
        let b = manager.issue_or_get(&upper).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_consume_once() {
        let (manager, _) = manager();
        let nonce = manager.issue_or_get(&address()).await.unwrap();

        manager.consume(&address(), nonce).await.unwrap();
        assert!(matches!(
            manager.consume(&address(), nonce).await,
            Err(NonceError::NotFound)
        ));
        assert_eq!(manager.peek(&address()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_consume_mismatch_keeps_nonce() {
        let (manager, _) = manager();
        let nonce = manager.issue_or_get(&address()).await.unwrap();
        let wrong = if nonce == 999_999 { 100_000 } else { nonce + 1 };

        assert!(matches!(
            manager.consume(&address(), wrong).await,
            Err(NonceError::Mismatch)
        ));
        assert_eq!(manager.peek(&address()).await.unwrap(), Some(nonce));
    }

    #[tokio::test]
    async fn test_consume_without_issue() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.consume(&address(), 123456).await,
            Err(NonceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_new_nonce_after_consume() {
        let (manager, _) = manager();
        let first = manager.issue_or_get(&address()).await.unwrap();
        manager.consume(&address(), first).await.unwrap();

        let second = manager.issue_or_get(&address()).await.unwrap();
        assert!(NONCE_RANGE.contains(&second));
        assert_eq!(manager.peek(&address()).await.unwrap(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_nonce_not_found() {
        let store = MemoryStore::new();
        let manager = NonceManager::new(Arc::new(store), Duration::from_secs(5));
        let nonce = manager.issue_or_get(&address()).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(matches!(
            manager.consume(&address(), nonce).await,
            Err(NonceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_winner() {
        let (manager, _) = manager();
        let nonce = manager.issue_or_get(&address()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.consume(&address(), nonce).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
