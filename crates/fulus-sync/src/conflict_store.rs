//! C8: Conflict store.
//!
//! Records typed, prioritized conflicts and enforces the status lifecycle
//! defined on [`fulus_types::conflict::ConflictStatus`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::conflict::{ConflictStatus, ConflictType, SyncConflict};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConflictStoreError {
    #[error("conflict not found")]
    NotFound,
    #[error("illegal transition from {from:?} to {to:?}")]
    IllegalTransition { from: ConflictStatus, to: ConflictStatus },
}

#[async_trait]
pub trait ConflictStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        transaction_id: Uuid,
        user_id: &str,
        conflict_type: ConflictType,
        description: &str,
        expected_value: Option<String>,
        actual_value: Option<String>,
        now: DateTime<Utc>,
    ) -> SyncConflict;

    /// Unresolved conflicts for a user, sorted by priority then detection
    /// time (lower priority number first).
    async fn unresolved_for_user(&self, user_id: &str) -> Vec<SyncConflict>;

    async fn transition(&self, conflict_id: Uuid, to: ConflictStatus, resolved_by: Option<&str>, now: DateTime<Utc>) -> Result<SyncConflict, ConflictStoreError>;

    /// Plain-English explanation for a conflict, surfaced to the
    /// offline-query chat tool.
    async fn explain(&self, conflict_id: Uuid) -> Option<String>;

    /// Deletes conflicts resolved before `cutoff`, returning the count
    /// removed. Used by the retention scheduler.
    async fn cleanup_resolved_before(&self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryConflictStore {
    conflicts: Arc<DashMap<Uuid, SyncConflict>>,
}

impl InMemoryConflictStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConflictStore for InMemoryConflictStore {
    async fn record(
        &self,
        transaction_id: Uuid,
        user_id: &str,
        conflict_type: ConflictType,
        description: &str,
        expected_value: Option<String>,
        actual_value: Option<String>,
        now: DateTime<Utc>,
    ) -> SyncConflict {
        let conflict = SyncConflict::new(transaction_id, user_id, conflict_type, description, expected_value, actual_value, now);
        self.conflicts.insert(conflict.id, conflict.clone());
        conflict
    }

    async fn unresolved_for_user(&self, user_id: &str) -> Vec<SyncConflict> {
        let mut out: Vec<SyncConflict> = self
            .conflicts
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.status == ConflictStatus::Unresolved)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.detected_at.cmp(&b.detected_at)));
        out
    }

    async fn transition(&self, conflict_id: Uuid, to: ConflictStatus, resolved_by: Option<&str>, now: DateTime<Utc>) -> Result<SyncConflict, ConflictStoreError> {
        let mut entry = self.conflicts.get_mut(&conflict_id).ok_or(ConflictStoreError::NotFound)?;
        if !entry.status.can_transition_to(to) {
            return Err(ConflictStoreError::IllegalTransition { from: entry.status, to });
        }
        entry.status = to;
        if matches!(to, ConflictStatus::AutoResolved | ConflictStatus::ManualResolved | ConflictStatus::Rejected) {
            entry.resolved_at = Some(now);
            entry.resolved_by = resolved_by.map(str::to_string);
        }
        Ok(entry.clone())
    }

    async fn explain(&self, conflict_id: Uuid) -> Option<String> {
        let entry = self.conflicts.get(&conflict_id)?;
        let amount = entry
            .expected_balance
            .or(entry.actual_balance)
            .unwrap_or(Decimal::ZERO);
        Some(entry.conflict_type.explain(amount))
    }

    async fn cleanup_resolved_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.conflicts.len();
        self.conflicts.retain(|_, v| match v.resolved_at {
            Some(resolved_at) => resolved_at >= cutoff,
            None => true,
        });
        before - self.conflicts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_sets_priority_from_type() {
        let store = InMemoryConflictStore::new();
        let now = Utc::now();
        let conflict = store
            .record(Uuid::new_v4(), "user-1", ConflictType::ChainBroken, "broken link", None, None, now)
            .await;
        assert_eq!(conflict.priority, 3);
        assert_eq!(conflict.status, ConflictStatus::Unresolved);
    }

    #[tokio::test]
    async fn unresolved_for_user_sorts_by_priority() {
        let store = InMemoryConflictStore::new();
        let now = Utc::now();
        store.record(Uuid::new_v4(), "user-1", ConflictType::TimestampInvalid, "late", None, None, now).await;
        store.record(Uuid::new_v4(), "user-1", ConflictType::DoubleSpend, "replay", None, None, now).await;
        let list = store.unresolved_for_user("user-1").await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].conflict_type, ConflictType::DoubleSpend);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = InMemoryConflictStore::new();
        let now = Utc::now();
        let conflict = store.record(Uuid::new_v4(), "user-1", ConflictType::DoubleSpend, "x", None, None, now).await;
        let err = store.transition(conflict.id, ConflictStatus::Rejected, None, now).await;
        assert!(matches!(err, Err(ConflictStoreError::IllegalTransition { .. })));
    }

    #[tokio::test]
    async fn legal_transition_stamps_resolution() {
        let store = InMemoryConflictStore::new();
        let now = Utc::now();
        let conflict = store.record(Uuid::new_v4(), "user-1", ConflictType::InsufficientFunds, "x", None, None, now).await;
        let resolved = store.transition(conflict.id, ConflictStatus::AutoResolved, None, now).await.unwrap();
        assert_eq!(resolved.status, ConflictStatus::AutoResolved);
        assert_eq!(resolved.resolved_at, Some(now));
    }
}
