//! C14: Retention scheduler.
//!
//! Periodic jobs: nonce sweep (daily), message prune (daily, cutoff
//! `now - chat.prune-after-days`), stale conversation archival (folded into
//! the same prune pass — both key off `lastMessageAt`), and resolved-conflict
//! cleanup (configurable cutoff). Every job is idempotent: running it twice
//! back-to-back with the same `now` is a no-op on the second call, so an
//! overlapping trigger (e.g. a missed tick replayed after a restart) cannot
//! double-delete or corrupt state.

use crate::conversation::ConversationStore;
use crate::insights_cache::InsightsCache;
use crate::memory_cache::ConversationMemoryCache;
use chrono::{DateTime, Duration, Utc};
use fulus_sync::conflict_store::ConflictStore;
use fulus_sync::nonce_registry::NonceRegistry;
use std::sync::Arc;

/// Default `nonce.retention-days` from spec §6 (also the nonce sweep's
/// implicit cadence reference, though the sweep itself runs daily).
pub const NONCE_RETENTION_DAYS: i64 = 7;

pub struct RetentionScheduler {
    nonce_registry: Arc<dyn NonceRegistry>,
    conflict_store: Arc<dyn ConflictStore>,
    conversation_store: Arc<dyn ConversationStore>,
    memory_cache: ConversationMemoryCache,
    insights_cache: InsightsCache,
    prune_after_days: i64,
    resolved_conflict_retention_days: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionReport {
    pub nonces_swept: usize,
    pub messages_pruned: usize,
    pub conversations_archived: usize,
    pub conflicts_cleaned: usize,
    pub memory_cache_evicted: usize,
    pub insights_cache_evicted: usize,
}

impl RetentionScheduler {
    pub fn new(
        nonce_registry: Arc<dyn NonceRegistry>,
        conflict_store: Arc<dyn ConflictStore>,
        conversation_store: Arc<dyn ConversationStore>,
        memory_cache: ConversationMemoryCache,
        insights_cache: InsightsCache,
        prune_after_days: i64,
        resolved_conflict_retention_days: i64,
    ) -> Self {
        RetentionScheduler {
            nonce_registry,
            conflict_store,
            conversation_store,
            memory_cache,
            insights_cache,
            prune_after_days,
            resolved_conflict_retention_days,
        }
    }

    /// Daily nonce sweep: drops admitted nonces past their 7-day retention
    /// window (spec §4.2).
    #[tracing::instrument(skip_all)]
    pub async fn run_nonce_sweep(&self, now: DateTime<Utc>) -> usize {
        let removed = self.nonce_registry.sweep_expired(now).await;
        tracing::info!(removed, "nonce sweep completed");
        removed
    }

    /// Daily message prune + stale conversation archival, run together
    /// since both are keyed off `lastMessageAt < cutoff`.
    #[tracing::instrument(skip_all)]
    pub async fn run_message_prune(&self, now: DateTime<Utc>) -> (usize, usize) {
        let cutoff = now - Duration::days(self.prune_after_days);
        let (messages, conversations) = self.conversation_store.prune(cutoff).await;
        tracing::info!(messages, conversations, "message prune completed");
        (messages, conversations)
    }

    /// Resolved-conflict cleanup: deletes conflicts resolved before the
    /// configured retention cutoff.
    #[tracing::instrument(skip_all)]
    pub async fn run_resolved_conflict_cleanup(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.resolved_conflict_retention_days);
        let removed = self.conflict_store.cleanup_resolved_before(cutoff).await;
        tracing::info!(removed, "resolved-conflict cleanup completed");
        removed
    }

    /// Runs every job once, in the order they're documented in spec §4.11.
    /// Intended to be called from a `tokio::time::interval` loop in
    /// `fulus-server`'s main; each sub-job is independently idempotent so a
    /// partial failure (caught and logged by the caller) doesn't leave
    /// stores in an inconsistent state.
    pub async fn run_all(&self, now: DateTime<Utc>) -> RetentionReport {
        let nonces_swept = self.run_nonce_sweep(now).await;
        let (messages_pruned, conversations_archived) = self.run_message_prune(now).await;
        let conflicts_cleaned = self.run_resolved_conflict_cleanup(now).await;
        let memory_cache_evicted = self.memory_cache.evict_expired(now);
        let insights_cache_evicted = self.insights_cache.evict_expired(now);
        RetentionReport {
            nonces_swept,
            messages_pruned,
            conversations_archived,
            conflicts_cleaned,
            memory_cache_evicted,
            insights_cache_evicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::InMemoryConversationStore;
    use crate::insights_cache::StatsEpoch;
    use fulus_sync::conflict_store::InMemoryConflictStore;
    use fulus_sync::nonce_registry::InMemoryNonceRegistry;
    use fulus_types::conversation::MessageRole;
    use fulus_types::hexbytes::HexHash;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn run_all_is_idempotent_on_repeat() {
        let nonce_registry = Arc::new(InMemoryNonceRegistry::new());
        nonce_registry.admit("user-1", &"a".repeat(32), HexHash::genesis(), ts(0)).await.unwrap();
        let conflict_store = Arc::new(InMemoryConflictStore::new());
        let conversation_store = Arc::new(InMemoryConversationStore::new());
        conversation_store.append("user-1", MessageRole::User, "hi", None, ts(0)).await;

        let scheduler = RetentionScheduler::new(
            nonce_registry,
            conflict_store,
            conversation_store,
            ConversationMemoryCache::new(10),
            InsightsCache::new(Arc::new(StatsEpoch::new(ts(0)))),
            30,
            30,
        );

        let far_future = ts(0) + Duration::days(400);
        let first = scheduler.run_all(far_future).await;
        let second = scheduler.run_all(far_future).await;
        assert_eq!(first.nonces_swept, 1);
        assert_eq!(second.nonces_swept, 0);
        assert_eq!(second.messages_pruned, 0);
    }
}
