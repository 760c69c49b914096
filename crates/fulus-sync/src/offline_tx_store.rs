//! Durable record of accepted [`OfflineTx`] rows, keyed by `txHash`.
//!
//! Not a numbered component on its own, but required by the data model's
//! uniqueness invariant on `txHash` and by the orchestrator's idempotent
//! replay check (a resubmitted, already-`SYNCED` transaction must be
//! recognized without re-applying it).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::hexbytes::HexHash;
use fulus_types::offline_tx::{OfflineTx, TxStatus};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait OfflineTxStore: Send + Sync {
    async fn upsert(&self, tx: OfflineTx);

    async fn by_hash(&self, tx_hash: &HexHash) -> Option<OfflineTx>;

    async fn mark_synced(&self, tx_hash: &HexHash, online_tx_id: Uuid, now: DateTime<Utc>);

    async fn mark_failed(&self, tx_hash: &HexHash, error: &str, now: DateTime<Utc>);

    async fn mark_conflict(&self, tx_hash: &HexHash, now: DateTime<Utc>);

    /// Retries: moves every `FAILED` row for a user back to `PENDING`.
    async fn reset_failed_for_retry(&self, user_id_phone: &str) -> Vec<OfflineTx>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryOfflineTxStore {
    rows: Arc<DashMap<String, OfflineTx>>,
}

impl InMemoryOfflineTxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineTxStore for InMemoryOfflineTxStore {
    async fn upsert(&self, tx: OfflineTx) {
        self.rows.insert(tx.tx_hash.as_str().to_string(), tx);
    }

    async fn by_hash(&self, tx_hash: &HexHash) -> Option<OfflineTx> {
        self.rows.get(tx_hash.as_str()).map(|r| r.clone())
    }

    async fn mark_synced(&self, tx_hash: &HexHash, online_tx_id: Uuid, now: DateTime<Utc>) {
        if let Some(mut row) = self.rows.get_mut(tx_hash.as_str()) {
            row.status = TxStatus::Synced;
            row.online_tx_id = Some(online_tx_id);
            row.last_sync_attempt = Some(now);
            row.sync_attempts += 1;
        }
    }

    async fn mark_failed(&self, tx_hash: &HexHash, error: &str, now: DateTime<Utc>) {
        if let Some(mut row) = self.rows.get_mut(tx_hash.as_str()) {
            row.status = TxStatus::Failed;
            row.sync_error = Some(error.to_string());
            row.last_sync_attempt = Some(now);
            row.sync_attempts += 1;
        }
    }

    async fn mark_conflict(&self, tx_hash: &HexHash, now: DateTime<Utc>) {
        if let Some(mut row) = self.rows.get_mut(tx_hash.as_str()) {
            row.status = TxStatus::Conflict;
            row.last_sync_attempt = Some(now);
            row.sync_attempts += 1;
        }
    }

    async fn reset_failed_for_retry(&self, user_id_phone: &str) -> Vec<OfflineTx> {
        let mut reset = Vec::new();
        for mut entry in self.rows.iter_mut() {
            if entry.sender_phone == user_id_phone && entry.status == TxStatus::Failed {
                entry.status = TxStatus::Pending;
                reset.push(entry.clone());
            }
        }
        reset
    }
}
