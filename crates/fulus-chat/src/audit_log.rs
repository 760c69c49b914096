//! C13: Audit log.
//!
//! Append-only record of admin actions and security events (rate-limit
//! refusals, authorization refusals, admin chat turns).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::conversation::AuditLog;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        admin_id: &str,
        action: &str,
        detail: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AuditLog;

    async fn for_admin(&self, admin_id: &str) -> Vec<AuditLog>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryAuditLogStore {
    entries: Arc<DashMap<Uuid, AuditLog>>,
}

impl InMemoryAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogStore for InMemoryAuditLogStore {
    async fn record(
        &self,
        admin_id: &str,
        action: &str,
        detail: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> AuditLog {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            admin_id: admin_id.to_string(),
            action: action.to_string(),
            detail,
            ip_address,
            user_agent,
            timestamp: now,
        };
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    async fn for_admin(&self, admin_id: &str) -> Vec<AuditLog> {
        let mut out: Vec<AuditLog> = self
            .entries
            .iter()
            .filter(|e| e.admin_id == admin_id)
            .map(|e| e.clone())
            .collect();
        out.sort_by_key(|e| e.timestamp);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_and_list_round_trip() {
        let store = InMemoryAuditLogStore::new();
        let now = Utc::now();
        store.record("admin-1", "chat", Some("refused: rate limited".into()), None, None, now).await;
        let entries = store.for_admin("admin-1").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "chat");
    }
}
