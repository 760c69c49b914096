//! `budget-assistant` tool collaborator: out-of-scope as a full
//! categorization/ML feature (spec Non-goals); the chat tool surfaces a
//! deterministic category breakdown over whatever history is recorded.

use async_trait::async_trait;
use dashmap::DashMap;
use fulus_types::ledger::{LedgerEntryType, LedgerTransaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait BudgetAssistantProvider: Send + Sync {
    async fn categorize(&self, user_id: &str, period_days: i64) -> Vec<BudgetCategoryTotal>;
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetCategoryTotal {
    pub category: String,
    pub total: Decimal,
}

#[derive(Clone, Default)]
pub struct InMemoryBudgetAssistant {
    history: Arc<DashMap<String, Vec<LedgerTransaction>>>,
}

impl InMemoryBudgetAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: LedgerTransaction) {
        self.history.entry(entry.user_id.clone()).or_default().push(entry);
    }
}

#[async_trait]
impl BudgetAssistantProvider for InMemoryBudgetAssistant {
    async fn categorize(&self, user_id: &str, _period_days: i64) -> Vec<BudgetCategoryTotal> {
        let Some(rows) = self.history.get(user_id) else {
            return Vec::new();
        };
        let mut totals: std::collections::BTreeMap<String, Decimal> = std::collections::BTreeMap::new();
        for row in rows.iter().filter(|r| r.entry_type == LedgerEntryType::Debit) {
            *totals.entry(row.category.clone()).or_insert(Decimal::ZERO) += row.amount;
        }
        totals
            .into_iter()
            .map(|(category, total)| BudgetCategoryTotal { category, total })
            .collect()
    }
}
