//! Per-user chain head, counters, and validity flag.

use crate::hexbytes::HexHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running counters maintained alongside a user's [`ChainState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCounters {
    pub total: u64,
    pub pending: u64,
    pub synced: u64,
    pub failed: u64,
    pub conflict: u64,
}

/// One row per user, tracking the head of their accepted transaction chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub user_id: String,
    /// The chain head the server has authoritatively accepted.
    pub last_synced_hash: HexHash,
    /// Equal to `last_synced_hash` on success; kept distinct in the model to
    /// mirror the two head fields tracked by the sync engine.
    pub current_head_hash: HexHash,
    pub genesis_hash: HexHash,
    pub chain_valid: bool,
    pub validation_error: Option<String>,
    pub counters: ChainCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl ChainState {
    /// Initializes a fresh chain state for a user who has never synced
    /// before: head fields both point at genesis.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let genesis = HexHash::genesis();
        ChainState {
            user_id: user_id.into(),
            last_synced_hash: genesis.clone(),
            current_head_hash: genesis.clone(),
            genesis_hash: genesis,
            chain_valid: true,
            validation_error: None,
            counters: ChainCounters::default(),
            created_at: now,
            updated_at: now,
            last_synced_at: None,
            last_validated_at: None,
        }
    }

    /// Advances the chain head on a successful sync of `hash`.
    pub fn mark_synced(&mut self, hash: HexHash, now: DateTime<Utc>) {
        self.last_synced_hash = hash.clone();
        self.current_head_hash = hash;
        self.counters.pending = self.counters.pending.saturating_sub(1);
        self.counters.synced += 1;
        self.last_synced_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.counters.pending = self.counters.pending.saturating_sub(1);
        self.counters.failed += 1;
        self.updated_at = now;
    }

    pub fn mark_conflict(&mut self, now: DateTime<Utc>) {
        self.counters.pending = self.counters.pending.saturating_sub(1);
        self.counters.conflict += 1;
        self.updated_at = now;
    }

    pub fn register_pending(&mut self, now: DateTime<Utc>) {
        self.counters.total += 1;
        self.counters.pending += 1;
        self.updated_at = now;
    }

    /// Marks the chain as sticky-invalid. Only an operator action (not
    /// modeled in this crate) can clear this flag.
    pub fn invalidate(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.chain_valid = false;
        self.validation_error = Some(reason.into());
        self.last_validated_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chain_state_points_at_genesis() {
        let now = Utc::now();
        let state = ChainState::new("user-1", now);
        assert_eq!(state.last_synced_hash, HexHash::genesis());
        assert_eq!(state.current_head_hash, state.last_synced_hash);
        assert!(state.chain_valid);
    }

    #[test]
    fn invalidate_is_sticky_until_reset() {
        let now = Utc::now();
        let mut state = ChainState::new("user-1", now);
        state.invalidate("chain broken", now);
        assert!(!state.chain_valid);
        assert_eq!(state.validation_error.as_deref(), Some("chain broken"));
    }
}
