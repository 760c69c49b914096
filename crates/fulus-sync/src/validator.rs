//! C7: Validator.
//!
//! Pure over its inputs plus read-only access to the nonce registry and the
//! sender's balance. Never mutates state; the orchestrator decides what to
//! do with its reports.

use crate::hash_chain::verify_tx_hash;
use crate::nonce_registry::NonceRegistry;
use crate::payload_codec::{self, PayloadCodecError};
use crate::signature::{verify_signature, SignerKey};
use chrono::{DateTime, Duration, Utc};
use fulus_types::chain_state::ChainState;
use fulus_types::conflict::ConflictType;
use fulus_types::offline_tx::{Direction, OfflineTx};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// One chain-integrity violation, tied to the offending transaction by id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIssue {
    pub transaction_id: Uuid,
    pub conflict_type: ConflictType,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub issues: Vec<ChainIssue>,
}

impl ChainReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// First batch-fatal issue, if any (`CHAIN_BROKEN` or `INVALID_HASH`).
    pub fn first_fatal(&self) -> Option<&ChainIssue> {
        self.issues.iter().find(|i| i.conflict_type.is_batch_fatal())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadReport {
    pub transaction_id: Uuid,
    pub violations: Vec<ConflictType>,
}

impl PayloadReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleSpendEntry {
    pub transaction_id: Uuid,
    pub conflict_type: ConflictType,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleSpendReport {
    pub entries: Vec<DoubleSpendEntry>,
}

impl DoubleSpendReport {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReports {
    pub chain: ChainReport,
    pub payload: Vec<PayloadReport>,
    pub double_spend: DoubleSpendReport,
}

pub struct ValidatorConfig {
    pub max_age_days: i64,
    pub future_tolerance_minutes: i64,
    pub max_amount: Decimal,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            max_age_days: 30,
            future_tolerance_minutes: 5,
            max_amount: fulus_types::offline_tx::MAX_AMOUNT,
        }
    }
}

/// Sorts a batch by timestamp ascending, ties broken by original insertion
/// order (a stable sort suffices since `sort_by_key` is stable).
pub fn sorted_by_timestamp(batch: &[OfflineTx]) -> Vec<OfflineTx> {
    let mut sorted = batch.to_vec();
    sorted.sort_by_key(|tx| tx.timestamp);
    sorted
}

/// Chain integrity pass: duplicate hash/nonce within batch, link continuity
/// against `chain_state`, hash recomputation, and timestamp monotonicity.
pub fn validate_chain(batch: &[OfflineTx], chain_state: &ChainState) -> ChainReport {
    let sorted = sorted_by_timestamp(batch);
    let mut report = ChainReport::default();
    let mut seen_hashes = HashSet::new();
    let mut seen_nonces = HashSet::new();

    for (i, tx) in sorted.iter().enumerate() {
        if !seen_hashes.insert(tx.tx_hash.as_str().to_string()) {
            report.issues.push(ChainIssue {
                transaction_id: tx.id,
                conflict_type: ConflictType::DoubleSpend,
                expected: None,
                actual: Some(tx.tx_hash.as_str().to_string()),
            });
            continue;
        }
        if !seen_nonces.insert(tx.nonce.clone()) {
            report.issues.push(ChainIssue {
                transaction_id: tx.id,
                conflict_type: ConflictType::NonceReused,
                expected: None,
                actual: Some(tx.nonce.clone()),
            });
            continue;
        }

        let expected_previous = if i == 0 {
            chain_state.last_synced_hash.clone()
        } else {
            sorted[i - 1].tx_hash.clone()
        };
        if tx.previous_hash != expected_previous {
            report.issues.push(ChainIssue {
                transaction_id: tx.id,
                conflict_type: ConflictType::ChainBroken,
                expected: Some(expected_previous.as_str().to_string()),
                actual: Some(tx.previous_hash.as_str().to_string()),
            });
            continue;
        }

        let hash_ok = verify_tx_hash(
            &tx.sender_phone,
            &tx.recipient_phone,
            tx.amount,
            tx.timestamp,
            &tx.nonce,
            &tx.previous_hash,
            &tx.tx_hash,
        );
        if !hash_ok {
            report.issues.push(ChainIssue {
                transaction_id: tx.id,
                conflict_type: ConflictType::InvalidHash,
                expected: None,
                actual: None,
            });
            continue;
        }

        if i > 0 && tx.timestamp < sorted[i - 1].timestamp {
            report.issues.push(ChainIssue {
                transaction_id: tx.id,
                conflict_type: ConflictType::ChainBroken,
                expected: None,
                actual: None,
            });
        }
    }

    report
}

/// Payload pass for a single transaction: amount bounds, timestamp window,
/// nonce uniqueness against the persistent registry, signature, and
/// decryptability.
pub async fn validate_payload(
    tx: &OfflineTx,
    config: &ValidatorConfig,
    nonce_registry: &dyn NonceRegistry,
    signer_key: &SignerKey,
    payload_key: &[u8; 32],
    now: DateTime<Utc>,
) -> PayloadReport {
    let mut violations = Vec::new();

    if tx.amount <= Decimal::ZERO || tx.amount > config.max_amount {
        violations.push(ConflictType::InvalidHash);
    }

    let earliest = now - Duration::days(config.max_age_days);
    let latest = now + Duration::minutes(config.future_tolerance_minutes);
    if tx.timestamp < earliest || tx.timestamp > latest {
        violations.push(ConflictType::TimestampInvalid);
    }

    if nonce_registry.exists(&tx.sender_phone, &tx.nonce, now).await {
        violations.push(ConflictType::NonceReused);
    }

    if verify_signature(&tx.tx_hash, &tx.signature, signer_key).is_err() {
        violations.push(ConflictType::InvalidSignature);
    }

    if let Err(PayloadCodecError::TagMismatch) | Err(PayloadCodecError::Truncated) =
        payload_codec::decrypt(&tx.payload, payload_key)
    {
        violations.push(ConflictType::InvalidHash);
    }

    PayloadReport {
        transaction_id: tx.id,
        violations,
    }
}

/// Double-spend pass: projects the sender's balance across the batch,
/// flagging any entry that would drive it negative.
pub fn validate_double_spend(batch: &[OfflineTx], user_id_phone: &str, starting_balance: Decimal) -> DoubleSpendReport {
    let sorted = sorted_by_timestamp(batch);
    let mut projected = starting_balance;
    let mut report = DoubleSpendReport::default();

    for tx in &sorted {
        match tx.direction_for(user_id_phone) {
            Some(Direction::Debit) => {
                projected -= tx.amount;
                if projected < Decimal::ZERO {
                    // If this transaction's own amount could have been
                    // covered by the sender's starting balance alone, the
                    // shortfall comes from contention with another debit
                    // already spending those same funds earlier in the
                    // batch, a genuine double spend. Otherwise this single
                    // transaction could never have been afforded regardless
                    // of batch ordering.
                    let conflict_type = if tx.amount <= starting_balance {
                        ConflictType::DoubleSpend
                    } else {
                        ConflictType::InsufficientFunds
                    };
                    report.entries.push(DoubleSpendEntry {
                        transaction_id: tx.id,
                        conflict_type,
                    });
                    projected += tx.amount;
                }
            }
            Some(Direction::Credit) => {
                projected += tx.amount;
            }
            None => {}
        }
    }

    report
}
