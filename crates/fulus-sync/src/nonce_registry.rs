//! C3: Nonce registry.
//!
//! Admits nonces exactly once per user, per the hash chain's replay
//! protection requirement. Mirrors the teacher's `PendingNonceManager`
//! shape: an `Arc<DashMap<..>>` wrapped in a small `Clone` handle, with a
//! trait seam so the server can swap this in-memory store for a
//! database-backed one without touching callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::hexbytes::HexHash;
use fulus_types::nonce::UsedNonce;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NonceRegistryError {
    #[error("nonce already used")]
    NonceReused,
}

/// Admits and tracks used nonces so a replayed transaction is rejected.
#[async_trait]
pub trait NonceRegistry: Send + Sync {
    /// Admits `nonce` for `user_id`, associating it with `tx_hash`. Fails
    /// with [`NonceRegistryError::NonceReused`] if the pair
    /// `(user_id, nonce)` was already admitted and hasn't expired.
    async fn admit(
        &self,
        user_id: &str,
        nonce: &str,
        tx_hash: HexHash,
        now: DateTime<Utc>,
    ) -> Result<(), NonceRegistryError>;

    /// Returns whether `(user_id, nonce)` is currently admitted (and not
    /// expired as of `now`).
    async fn exists(&self, user_id: &str, nonce: &str, now: DateTime<Utc>) -> bool;

    /// Drops every admitted nonce whose retention window has elapsed as of
    /// `now`, returning the count removed.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryNonceRegistry {
    used: Arc<DashMap<(String, String), UsedNonce>>,
}

impl InMemoryNonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NonceRegistry for InMemoryNonceRegistry {
    async fn admit(
        &self,
        user_id: &str,
        nonce: &str,
        tx_hash: HexHash,
        now: DateTime<Utc>,
    ) -> Result<(), NonceRegistryError> {
        let key = (user_id.to_string(), nonce.to_string());
        if let Some(existing) = self.used.get(&key) {
            if !existing.is_expired(now) {
                return Err(NonceRegistryError::NonceReused);
            }
        }
        self.used
            .insert(key, UsedNonce::new(nonce, user_id, tx_hash, now));
        Ok(())
    }

    async fn exists(&self, user_id: &str, nonce: &str, now: DateTime<Utc>) -> bool {
        self.used
            .get(&(user_id.to_string(), nonce.to_string()))
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.used.len();
        self.used.retain(|_, v| !v.is_expired(now));
        before - self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hash() -> HexHash {
        HexHash::genesis()
    }

    #[tokio::test]
    async fn first_admission_succeeds() {
        let registry = InMemoryNonceRegistry::new();
        let now = Utc::now();
        assert!(registry
            .admit("user-1", "n".repeat(32).as_str(), hash(), now)
            .await
            .is_ok());
        assert!(registry.exists("user-1", "n".repeat(32).as_str(), now).await);
    }

    #[tokio::test]
    async fn reused_nonce_is_rejected() {
        let registry = InMemoryNonceRegistry::new();
        let now = Utc::now();
        let nonce = "n".repeat(32);
        registry.admit("user-1", &nonce, hash(), now).await.unwrap();
        let err = registry.admit("user-1", &nonce, hash(), now).await;
        assert!(matches!(err, Err(NonceRegistryError::NonceReused)));
    }

    #[tokio::test]
    async fn same_nonce_different_user_is_allowed() {
        let registry = InMemoryNonceRegistry::new();
        let now = Utc::now();
        let nonce = "n".repeat(32);
        registry.admit("user-1", &nonce, hash(), now).await.unwrap();
        assert!(registry.admit("user-2", &nonce, hash(), now).await.is_ok());
    }

    #[tokio::test]
    async fn expired_nonce_can_be_readmitted() {
        let registry = InMemoryNonceRegistry::new();
        let now = Utc::now();
        let nonce = "n".repeat(32);
        registry.admit("user-1", &nonce, hash(), now).await.unwrap();
        let later = now + Duration::days(8);
        assert!(registry.admit("user-1", &nonce, hash(), later).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_expired_removes_only_stale_entries() {
        let registry = InMemoryNonceRegistry::new();
        let now = Utc::now();
        registry
            .admit("user-1", "a".repeat(32).as_str(), hash(), now)
            .await
            .unwrap();
        registry
            .admit("user-1", "b".repeat(32).as_str(), hash(), now + Duration::days(10))
            .await
            .unwrap();
        let removed = registry.sweep_expired(now + Duration::days(8)).await;
        assert_eq!(removed, 1);
        assert_eq!(registry.used.len(), 1);
    }
}
