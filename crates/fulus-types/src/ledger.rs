//! Ledger entries emitted by the Payment collaborator on a successful sync.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerEntryType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerEntryStatus {
    Completed,
    Reversed,
}

/// One ledger-side transaction, produced in a debit/credit pair for every
/// successfully synced [`crate::OfflineTx`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub category: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference: String,
    pub status: LedgerEntryStatus,
    pub is_offline: bool,
    pub offline_tx_id: Option<Uuid>,
    pub sender_phone: Option<String>,
    pub recipient_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Builds the `OFFLINE-<txHash>` reference string used for both legs of
    /// a synced transfer.
    pub fn offline_reference(tx_hash: &crate::hexbytes::HexHash) -> String {
        format!("OFFLINE-{tx_hash}")
    }
}
