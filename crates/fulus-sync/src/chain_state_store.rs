//! C5: Chain state store.
//!
//! Exactly one row per user. Tracks the chain head, running counters, and
//! the sticky `chainValid` flag. The in-memory implementation follows the
//! same `Arc<DashMap<..>>` handle shape as [`crate::nonce_registry`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::chain_state::ChainState;
use fulus_types::hexbytes::HexHash;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ChainStateStoreError {
    #[error("chain state for user not found")]
    NotFound,
}

#[async_trait]
pub trait ChainStateStore: Send + Sync {
    /// Returns the user's chain state, initializing one pointed at genesis
    /// if this is their first-ever interaction.
    async fn load_or_create(&self, user_id: &str, now: DateTime<Utc>) -> ChainState;

    async fn load(&self, user_id: &str) -> Option<ChainState>;

    async fn mark_synced(&self, user_id: &str, hash: HexHash, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError>;

    async fn mark_failed(&self, user_id: &str, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError>;

    async fn mark_conflict(&self, user_id: &str, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError>;

    async fn register_pending(&self, user_id: &str, count: u64, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError>;

    /// Sets the sticky `chainValid = false` flag. Only an operator action
    /// (not modeled here) may clear it.
    async fn invalidate(&self, user_id: &str, reason: String, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryChainStateStore {
    rows: Arc<DashMap<String, ChainState>>,
}

impl InMemoryChainStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainStateStore for InMemoryChainStateStore {
    async fn load_or_create(&self, user_id: &str, now: DateTime<Utc>) -> ChainState {
        self.rows
            .entry(user_id.to_string())
            .or_insert_with(|| ChainState::new(user_id, now))
            .clone()
    }

    async fn load(&self, user_id: &str) -> Option<ChainState> {
        self.rows.get(user_id).map(|r| r.clone())
    }

    async fn mark_synced(&self, user_id: &str, hash: HexHash, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or(ChainStateStoreError::NotFound)?;
        row.mark_synced(hash, now);
        Ok(row.clone())
    }

    async fn mark_failed(&self, user_id: &str, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or(ChainStateStoreError::NotFound)?;
        row.mark_failed(now);
        Ok(row.clone())
    }

    async fn mark_conflict(&self, user_id: &str, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or(ChainStateStoreError::NotFound)?;
        row.mark_conflict(now);
        Ok(row.clone())
    }

    async fn register_pending(&self, user_id: &str, count: u64, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or(ChainStateStoreError::NotFound)?;
        for _ in 0..count {
            row.register_pending(now);
        }
        Ok(row.clone())
    }

    async fn invalidate(&self, user_id: &str, reason: String, now: DateTime<Utc>) -> Result<ChainState, ChainStateStoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or(ChainStateStoreError::NotFound)?;
        row.invalidate(reason, now);
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_load_initializes_at_genesis() {
        let store = InMemoryChainStateStore::new();
        let now = Utc::now();
        let state = store.load_or_create("user-1", now).await;
        assert_eq!(state.current_head_hash, HexHash::genesis());
        assert!(state.chain_valid);
    }

    #[tokio::test]
    async fn mark_synced_advances_head_and_counters() {
        let store = InMemoryChainStateStore::new();
        let now = Utc::now();
        store.load_or_create("user-1", now).await;
        store.register_pending("user-1", 1, now).await.unwrap();
        let hash = HexHash::parse("a".repeat(64)).unwrap();
        let state = store.mark_synced("user-1", hash.clone(), now).await.unwrap();
        assert_eq!(state.current_head_hash, hash);
        assert_eq!(state.counters.synced, 1);
        assert_eq!(state.counters.pending, 0);
    }

    #[tokio::test]
    async fn invalidate_is_queryable_afterward() {
        let store = InMemoryChainStateStore::new();
        let now = Utc::now();
        store.load_or_create("user-1", now).await;
        store.invalidate("user-1", "chain broken".to_string(), now).await.unwrap();
        let state = store.load("user-1").await.unwrap();
        assert!(!state.chain_valid);
    }

    #[tokio::test]
    async fn unknown_user_operations_fail() {
        let store = InMemoryChainStateStore::new();
        let now = Utc::now();
        assert!(matches!(
            store.mark_synced("ghost", HexHash::genesis(), now).await,
            Err(ChainStateStoreError::NotFound)
        ));
    }
}
