//! `transaction-query` tool collaborator.
//!
//! The real implementation reads the production ledger's transaction
//! history table; this crate only commits to the contract plus an
//! in-memory reference suitable for tests.

use async_trait::async_trait;
use dashmap::DashMap;
use fulus_types::ledger::LedgerTransaction;
use std::sync::Arc;

#[async_trait]
pub trait TransactionHistoryProvider: Send + Sync {
    async fn recent(&self, user_id: &str, limit: usize) -> Vec<LedgerTransaction>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryTransactionHistory {
    entries: Arc<DashMap<String, Vec<LedgerTransaction>>>,
}

impl InMemoryTransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: LedgerTransaction) {
        self.entries.entry(entry.user_id.clone()).or_default().push(entry);
    }
}

#[async_trait]
impl TransactionHistoryProvider for InMemoryTransactionHistory {
    async fn recent(&self, user_id: &str, limit: usize) -> Vec<LedgerTransaction> {
        let Some(rows) = self.entries.get(user_id) else {
            return Vec::new();
        };
        let mut rows = rows.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fulus_types::ledger::{LedgerEntryStatus, LedgerEntryType};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn entry(user_id: &str, amount: i64) -> LedgerTransaction {
        LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            entry_type: LedgerEntryType::Debit,
            category: "transfer".to_string(),
            amount: Decimal::new(amount, 2),
            balance_after: Decimal::ZERO,
            reference: "REF".to_string(),
            status: LedgerEntryStatus::Completed,
            is_offline: false,
            offline_tx_id: None,
            sender_phone: None,
            recipient_phone: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_respects_limit_and_ordering() {
        let provider = InMemoryTransactionHistory::new();
        for amount in [100, 200, 300] {
            provider.record(entry("user-1", amount));
        }
        let rows = provider.recent("user-1", 2).await;
        assert_eq!(rows.len(), 2);
    }
}
