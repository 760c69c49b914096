//! Small in-process, TTL-expiring cache in front of [`crate::conversation`]'s
//! store so a chat turn doesn't re-load a user's conversation from the
//! durable store on every message. Mirrors the teacher's
//! `Arc<DashMap<..>>`-backed cache shape (`provider_cache.rs`), but with a
//! per-entry expiry instead of a static map.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fulus_types::conversation::Conversation;
use std::sync::Arc;

/// Default TTL for `chat.memory.cache-ttl-seconds` (spec §6).
pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 3600;

struct CacheEntry {
    conversation: Conversation,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ConversationMemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ConversationMemoryCache {
    pub fn new(ttl_seconds: i64) -> Self {
        ConversationMemoryCache {
            entries: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn get(&self, user_id: &str, now: DateTime<Utc>) -> Option<Conversation> {
        let entry = self.entries.get(user_id)?;
        if entry.expires_at < now {
            drop(entry);
            self.entries.remove(user_id);
            return None;
        }
        Some(entry.conversation.clone())
    }

    pub fn put(&self, user_id: &str, conversation: Conversation, now: DateTime<Utc>) {
        self.entries.insert(
            user_id.to_string(),
            CacheEntry {
                conversation,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Periodic eviction sweep, run by the retention scheduler (C14)
    /// alongside the nonce/message pruning jobs. Returns the count evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, v| v.expires_at >= now);
        before - self.entries.len()
    }
}

impl Default for ConversationMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn hit_then_expiry() {
        let cache = ConversationMemoryCache::new(10);
        let conv = Conversation::new("user-1", ts(0));
        cache.put("user-1", conv.clone(), ts(0));
        assert!(cache.get("user-1", ts(5)).is_some());
        assert!(cache.get("user-1", ts(11)).is_none());
    }

    #[test]
    fn evict_expired_sweeps_stale_entries_only() {
        let cache = ConversationMemoryCache::new(10);
        cache.put("user-1", Conversation::new("user-1", ts(0)), ts(0));
        cache.put("user-2", Conversation::new("user-2", ts(0)), ts(20));
        let evicted = cache.evict_expired(ts(25));
        assert_eq!(evicted, 1);
        assert!(cache.get("user-2", ts(25)).is_some());
    }
}
