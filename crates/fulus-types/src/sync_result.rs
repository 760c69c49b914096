//! Top-level result of a sync batch (C9 entrypoint output).

use crate::hexbytes::HexHash;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-transaction outcome recorded in a [`SyncResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub transaction_id: Uuid,
    pub tx_hash: HexHash,
    pub status: crate::offline_tx::TxStatus,
    pub online_tx_id: Option<Uuid>,
    pub conflict_id: Option<Uuid>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub user_id: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub conflict: usize,
    pub last_synced_hash: HexHash,
    pub final_balance: Option<Decimal>,
    pub outcomes: Vec<SyncOutcome>,
    /// Set only when an infrastructure error aborted the whole batch.
    pub failure: Option<String>,
}

impl SyncResult {
    pub fn empty(user_id: impl Into<String>, last_synced_hash: HexHash) -> Self {
        SyncResult {
            user_id: user_id.into(),
            total: 0,
            success: 0,
            failed: 0,
            conflict: 0,
            last_synced_hash,
            final_balance: None,
            outcomes: Vec::new(),
            failure: None,
        }
    }
}
