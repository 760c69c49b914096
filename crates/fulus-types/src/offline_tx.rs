//! The atom of the offline sync protocol: [`OfflineTx`].

use crate::hexbytes::{Base64Blob, HexHash};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum amount allowed for a single offline transaction (NGN 10,000,000).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Lifecycle status of an [`OfflineTx`].
///
/// `PENDING -> SYNCED` (terminal), `PENDING -> FAILED` (validator/ledger
/// rejection, retryable back to `PENDING`), `PENDING -> CONFLICT` (a
/// follow-up resolution is expected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Synced,
    Failed,
    Conflict,
}

/// A single offline transaction as submitted by a client device, plus the
/// server-side bookkeeping fields accumulated while syncing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTx {
    pub id: Uuid,
    pub sender_phone: String,
    pub recipient_phone: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
    pub payload: Base64Blob,
    pub tx_hash: HexHash,
    pub previous_hash: HexHash,
    pub signature: Base64Blob,
    pub status: TxStatus,
    #[serde(default)]
    pub sync_attempts: u32,
    #[serde(default)]
    pub last_sync_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_error: Option<String>,
    #[serde(default)]
    pub online_tx_id: Option<Uuid>,
}

impl OfflineTx {
    /// Direction helper used by the double-spend pass. Direction is derived
    /// from the sender/recipient phone fields, never from a transaction
    /// "type" tag.
    pub fn direction_for(&self, user_phone: &str) -> Option<Direction> {
        if self.sender_phone == user_phone {
            Some(Direction::Debit)
        } else if self.recipient_phone == user_phone {
            Some(Direction::Credit)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Debit,
    Credit,
}

/// Wire-layout view of an [`OfflineTx`], as submitted by a client device
/// before acceptance (no `id`, `status`, or retry telemetry yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTxWire {
    pub sender: String,
    pub recipient: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
    pub tx_hash: HexHash,
    pub previous_hash: HexHash,
    pub payload: Base64Blob,
    pub signature: Base64Blob,
}

impl From<OfflineTxWire> for OfflineTx {
    fn from(wire: OfflineTxWire) -> Self {
        OfflineTx {
            id: Uuid::new_v4(),
            sender_phone: wire.sender,
            recipient_phone: wire.recipient,
            amount: wire.amount,
            timestamp: wire.timestamp,
            nonce: wire.nonce,
            payload: wire.payload,
            tx_hash: wire.tx_hash,
            previous_hash: wire.previous_hash,
            signature: wire.signature,
            status: TxStatus::Pending,
            sync_attempts: 0,
            last_sync_attempt: None,
            sync_error: None,
            online_tx_id: None,
        }
    }
}
