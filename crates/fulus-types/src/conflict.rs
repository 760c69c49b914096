//! Typed, prioritized record of rejected offline transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of reasons an offline transaction can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    DoubleSpend,
    InsufficientFunds,
    InvalidSignature,
    NonceReused,
    InvalidHash,
    ChainBroken,
    TimestampInvalid,
}

impl ConflictType {
    /// Priority ordering for display and resolution order: lower number sorts first.
    pub fn priority(self) -> u8 {
        match self {
            ConflictType::DoubleSpend => 1,
            ConflictType::InvalidSignature => 1,
            ConflictType::NonceReused => 1,
            ConflictType::InsufficientFunds => 2,
            ConflictType::InvalidHash => 2,
            ConflictType::ChainBroken => 3,
            ConflictType::TimestampInvalid => 4,
        }
    }

    /// Whether this conflict type is batch-fatal: once encountered, the
    /// remainder of the batch is abandoned rather than processed entry by
    /// entry.
    pub fn is_batch_fatal(self) -> bool {
        matches!(self, ConflictType::ChainBroken | ConflictType::InvalidHash)
    }

    /// A plain-English explanation surfaced to users/operators and to the
    /// `offline-query` chat tool.
    pub fn explain(self, amount: Decimal) -> String {
        match self {
            ConflictType::DoubleSpend => format!(
                "This NGN {amount} transaction looks like it was already processed, or you don't have enough funds to cover everything once other pending transfers are counted."
            ),
            ConflictType::InsufficientFunds => format!(
                "There wasn't enough balance to cover this NGN {amount} transfer at the time it was applied."
            ),
            ConflictType::InvalidSignature => {
                "This transaction's signature couldn't be verified — it may have been tampered with, or was signed with the wrong key.".to_string()
            }
            ConflictType::NonceReused => {
                "This transaction reused an identifier from another transaction and was rejected to prevent a duplicate charge.".to_string()
            }
            ConflictType::InvalidHash => {
                "This transaction's contents don't match its recorded fingerprint and could not be trusted.".to_string()
            }
            ConflictType::ChainBroken => {
                "This transaction doesn't connect properly to your last synced transaction, so your device and the server are out of sync.".to_string()
            }
            ConflictType::TimestampInvalid => {
                "This transaction's recorded time is outside the allowed window — check your device clock.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    Unresolved,
    PendingUser,
    AutoResolved,
    ManualResolved,
    Rejected,
}

impl ConflictStatus {
    /// Whether `to` is a legal transition from `self`.
    pub fn can_transition_to(self, to: ConflictStatus) -> bool {
        matches!(
            (self, to),
            (ConflictStatus::Unresolved, ConflictStatus::AutoResolved)
                | (ConflictStatus::Unresolved, ConflictStatus::PendingUser)
                | (ConflictStatus::PendingUser, ConflictStatus::ManualResolved)
                | (ConflictStatus::PendingUser, ConflictStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub description: String,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub expected_balance: Option<Decimal>,
    pub actual_balance: Option<Decimal>,
    pub priority: u8,
    pub status: ConflictStatus,
    pub auto_resolution_attempted: bool,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub notes: Option<String>,
}

impl SyncConflict {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: Uuid,
        user_id: impl Into<String>,
        conflict_type: ConflictType,
        description: impl Into<String>,
        expected_value: Option<String>,
        actual_value: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        SyncConflict {
            id: Uuid::new_v4(),
            transaction_id,
            user_id: user_id.into(),
            conflict_type,
            description: description.into(),
            expected_value,
            actual_value,
            expected_balance: None,
            actual_balance: None,
            priority: conflict_type.priority(),
            status: ConflictStatus::Unresolved,
            auto_resolution_attempted: false,
            detected_at: now,
            resolved_at: None,
            resolved_by: None,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_match_documented_table() {
        assert_eq!(ConflictType::DoubleSpend.priority(), 1);
        assert_eq!(ConflictType::InvalidSignature.priority(), 1);
        assert_eq!(ConflictType::NonceReused.priority(), 1);
        assert_eq!(ConflictType::InsufficientFunds.priority(), 2);
        assert_eq!(ConflictType::InvalidHash.priority(), 2);
        assert_eq!(ConflictType::ChainBroken.priority(), 3);
        assert_eq!(ConflictType::TimestampInvalid.priority(), 4);
    }

    #[test]
    fn batch_fatal_set_is_chain_and_hash_only() {
        assert!(ConflictType::ChainBroken.is_batch_fatal());
        assert!(ConflictType::InvalidHash.is_batch_fatal());
        assert!(!ConflictType::InsufficientFunds.is_batch_fatal());
        assert!(!ConflictType::TimestampInvalid.is_batch_fatal());
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        assert!(ConflictStatus::Unresolved.can_transition_to(ConflictStatus::AutoResolved));
        assert!(ConflictStatus::PendingUser.can_transition_to(ConflictStatus::Rejected));
        assert!(!ConflictStatus::Unresolved.can_transition_to(ConflictStatus::Rejected));
        assert!(!ConflictStatus::AutoResolved.can_transition_to(ConflictStatus::Rejected));
    }
}
