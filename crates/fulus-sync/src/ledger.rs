//! C6: Ledger / payment collaborator.
//!
//! A transfer debits the sender, credits the recipient, and emits both
//! ledger entries atomically. This crate only promises the contract: a real
//! deployment backs it with a database transaction that the sync
//! orchestrator's other writes share. The in-memory implementation here
//! exists for tests and single-process demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::ledger::{LedgerEntryStatus, LedgerEntryType, LedgerTransaction};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance} < amount {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error("infrastructure error: {0}")]
    Infra(String),
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub new_sender_balance: Decimal,
    pub new_recipient_balance: Decimal,
    pub debit_entry: LedgerTransaction,
    pub credit_entry: LedgerTransaction,
}

/// Moves funds between two accounts and records the paired ledger entries.
/// Implementations MUST execute the balance updates and entry inserts as a
/// single atomic unit.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError>;

    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        sender_id: &str,
        recipient_id: &str,
        sender_phone: &str,
        recipient_phone: &str,
        amount: Decimal,
        reference: &str,
        offline_tx_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, LedgerError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    balances: Arc<DashMap<String, Decimal>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account balance, used to set up scenario fixtures in tests.
    pub fn seed(&self, user_id: impl Into<String>, balance: Decimal) {
        self.balances.insert(user_id.into(), balance);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.balances
            .get(user_id)
            .map(|b| *b)
            .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))
    }

    async fn transfer(
        &self,
        sender_id: &str,
        recipient_id: &str,
        sender_phone: &str,
        recipient_phone: &str,
        amount: Decimal,
        reference: &str,
        offline_tx_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut sender_balance = self
            .balances
            .get_mut(sender_id)
            .ok_or_else(|| LedgerError::UnknownAccount(sender_id.to_string()))?;
        if *sender_balance < amount {
            return Err(LedgerError::InsufficientFunds {
                balance: *sender_balance,
                amount,
            });
        }
        *sender_balance -= amount;
        let new_sender_balance = *sender_balance;
        drop(sender_balance);

        let mut recipient_balance = self
            .balances
            .entry(recipient_id.to_string())
            .or_insert(Decimal::ZERO);
        *recipient_balance += amount;
        let new_recipient_balance = *recipient_balance;
        drop(recipient_balance);

        let debit_entry = LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: sender_id.to_string(),
            entry_type: LedgerEntryType::Debit,
            category: "transfer".to_string(),
            amount,
            balance_after: new_sender_balance,
            reference: reference.to_string(),
            status: LedgerEntryStatus::Completed,
            is_offline: offline_tx_id.is_some(),
            offline_tx_id,
            sender_phone: Some(sender_phone.to_string()),
            recipient_phone: Some(recipient_phone.to_string()),
            created_at: now,
        };
        let credit_entry = LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: recipient_id.to_string(),
            entry_type: LedgerEntryType::Credit,
            category: "transfer".to_string(),
            amount,
            balance_after: new_recipient_balance,
            reference: reference.to_string(),
            status: LedgerEntryStatus::Completed,
            is_offline: offline_tx_id.is_some(),
            offline_tx_id,
            sender_phone: Some(sender_phone.to_string()),
            recipient_phone: Some(recipient_phone.to_string()),
            created_at: now,
        };

        Ok(TransferOutcome {
            new_sender_balance,
            new_recipient_balance,
            debit_entry,
            credit_entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transfer_moves_funds_and_emits_entries() {
        let ledger = InMemoryLedger::new();
        ledger.seed("user-a", Decimal::new(1000000, 2));
        let now = Utc::now();
        let outcome = ledger
            .transfer(
                "user-a",
                "user-b",
                "+2348000000001",
                "+2348000000002",
                Decimal::new(250000, 2),
                "OFFLINE-abc",
                None,
                now,
            )
            .await
            .unwrap();
        assert_eq!(outcome.new_sender_balance, Decimal::new(750000, 2));
        assert_eq!(outcome.new_recipient_balance, Decimal::new(250000, 2));
        assert_eq!(outcome.debit_entry.entry_type, LedgerEntryType::Debit);
        assert_eq!(outcome.credit_entry.entry_type, LedgerEntryType::Credit);
    }

    #[tokio::test]
    async fn transfer_fails_on_insufficient_funds() {
        let ledger = InMemoryLedger::new();
        ledger.seed("user-a", Decimal::new(100, 2));
        let now = Utc::now();
        let err = ledger
            .transfer(
                "user-a",
                "user-b",
                "+2348000000001",
                "+2348000000002",
                Decimal::new(250000, 2),
                "OFFLINE-abc",
                None,
                now,
            )
            .await;
        assert!(matches!(err, Err(LedgerError::InsufficientFunds { .. })));
    }
}
