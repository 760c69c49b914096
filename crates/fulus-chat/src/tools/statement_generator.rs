//! `statement-generator` tool collaborator: out-of-scope as a full PDF
//! statement pipeline (spec Non-goals), but the chat tool's contract and a
//! deterministic aggregate summary are in scope.

use async_trait::async_trait;
use fulus_types::ledger::{LedgerEntryType, LedgerTransaction};
use rust_decimal::Decimal;
use serde::Serialize;

#[async_trait]
pub trait StatementProvider: Send + Sync {
    async fn generate(&self, user_id: &str, period_days: i64) -> StatementSummary;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementSummary {
    pub user_id: String,
    pub period_days: i64,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub entry_count: usize,
}

/// Summarizes whatever transactions the transaction-history collaborator
/// happens to hold; a production statement generator would instead query a
/// dedicated reporting store across the full period.
#[derive(Clone, Default)]
pub struct InMemoryStatementProvider {
    history: std::sync::Arc<dashmap::DashMap<String, Vec<LedgerTransaction>>>,
}

impl InMemoryStatementProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: LedgerTransaction) {
        self.history.entry(entry.user_id.clone()).or_default().push(entry);
    }
}

#[async_trait]
impl StatementProvider for InMemoryStatementProvider {
    async fn generate(&self, user_id: &str, period_days: i64) -> StatementSummary {
        let rows = self.history.get(user_id);
        let mut total_debits = Decimal::ZERO;
        let mut total_credits = Decimal::ZERO;
        let mut entry_count = 0usize;
        if let Some(rows) = rows {
            for row in rows.iter() {
                entry_count += 1;
                match row.entry_type {
                    LedgerEntryType::Debit => total_debits += row.amount,
                    LedgerEntryType::Credit => total_credits += row.amount,
                }
            }
        }
        StatementSummary {
            user_id: user_id.to_string(),
            period_days,
            total_debits,
            total_credits,
            entry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fulus_types::ledger::LedgerEntryStatus;
    use uuid::Uuid;

    #[tokio::test]
    async fn generate_sums_debits_and_credits_separately() {
        let provider = InMemoryStatementProvider::new();
        provider.record(LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            entry_type: LedgerEntryType::Debit,
            category: "transfer".to_string(),
            amount: Decimal::new(1000, 2),
            balance_after: Decimal::ZERO,
            reference: "R1".to_string(),
            status: LedgerEntryStatus::Completed,
            is_offline: false,
            offline_tx_id: None,
            sender_phone: None,
            recipient_phone: None,
            created_at: Utc::now(),
        });
        let summary = provider.generate("user-1", 30).await;
        assert_eq!(summary.total_debits, Decimal::new(1000, 2));
        assert_eq!(summary.entry_count, 1);
    }
}
