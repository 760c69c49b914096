//! C12 (cache half): admin-insights response cache.
//!
//! Cache key is `hash16(normalize(query) || "|" || statsEpoch)`. The stats
//! epoch is a process-wide timestamp that advances whenever the platform
//! stats snapshot is regenerated (every 5 minutes in production), which
//! invalidates every previously cached key in one step without walking the
//! cache.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// TTL buckets by query class (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// "today/current/latest" — short-lived, 5 minutes.
    Immediate,
    /// "revenue/transaction/user/growth" — 15 minutes.
    Trend,
    /// Everything else — 60 minutes.
    General,
    /// "today/now/right now" — never cached.
    Uncacheable,
}

impl QueryClass {
    pub fn ttl_seconds(self) -> Option<i64> {
        match self {
            QueryClass::Immediate => Some(5 * 60),
            QueryClass::Trend => Some(15 * 60),
            QueryClass::General => Some(60 * 60),
            QueryClass::Uncacheable => None,
        }
    }
}

/// Classifies a raw admin query into a [`QueryClass`] by keyword matching.
/// Case-insensitive; checks the never-cache set first.
pub fn classify_query(query: &str) -> QueryClass {
    let q = query.to_lowercase();
    if q.contains("right now") || q.contains(" now") || q.starts_with("now") {
        return QueryClass::Uncacheable;
    }
    if q.contains("today") || q.contains("current") || q.contains("latest") {
        return QueryClass::Immediate;
    }
    if q.contains("revenue") || q.contains("transaction") || q.contains("user") || q.contains("growth") {
        return QueryClass::Trend;
    }
    QueryClass::General
}

/// Lowercases and collapses internal whitespace so equivalent queries with
/// different casing/spacing hash to the same cache key.
pub fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// 16 hex character digest (first 8 bytes of SHA-256), used for compact
/// cache keys.
pub fn hash16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// Process-wide platform-stats epoch. Advancing it invalidates every
/// previously computed cache key in O(1), since the key embeds the epoch.
#[derive(Debug, Default)]
pub struct StatsEpoch(AtomicI64);

impl StatsEpoch {
    pub fn new(now: DateTime<Utc>) -> Self {
        StatsEpoch(AtomicI64::new(now.timestamp()))
    }

    pub fn current(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Regenerates the stats snapshot, advancing the epoch.
    pub fn refresh(&self, now: DateTime<Utc>) {
        self.0.store(now.timestamp(), Ordering::Release);
    }
}

struct CacheEntry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// Query-hash + stats-epoch keyed response cache for the admin insights
/// chat surface.
#[derive(Clone)]
pub struct InsightsCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    epoch: Arc<StatsEpoch>,
    hits: Arc<AtomicI64>,
    misses: Arc<AtomicI64>,
}

impl InsightsCache {
    pub fn new(epoch: Arc<StatsEpoch>) -> Self {
        InsightsCache {
            entries: Arc::new(DashMap::new()),
            epoch,
            hits: Arc::new(AtomicI64::new(0)),
            misses: Arc::new(AtomicI64::new(0)),
        }
    }

    fn key_for(&self, query: &str) -> String {
        let normalized = normalize(query);
        hash16(&format!("{normalized}|{}", self.epoch.current()))
    }

    /// Looks up a cached response for `query`. Always misses for queries
    /// classified [`QueryClass::Uncacheable`].
    pub fn get(&self, query: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        if classify_query(query) == QueryClass::Uncacheable {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let key = self.key_for(query);
        let hit = self.entries.get(&key).and_then(|entry| {
            if entry.expires_at >= now {
                Some(entry.value.clone())
            } else {
                None
            }
        });
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Stores `value` for `query` under the TTL its [`QueryClass`]
    /// dictates. A no-op for uncacheable queries.
    pub fn put(&self, query: &str, value: serde_json::Value, now: DateTime<Utc>) {
        let class = classify_query(query);
        let Some(ttl_seconds) = class.ttl_seconds() else {
            return;
        };
        let key = self.key_for(query);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + Duration::seconds(ttl_seconds),
            },
        );
    }

    pub fn hits(&self) -> i64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> i64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Advances the stats epoch, invalidating every cached entry keyed on
    /// the prior epoch (they simply become unreachable; stale entries are
    /// reaped lazily on insertion churn or by the retention scheduler).
    pub fn refresh_epoch(&self, now: DateTime<Utc>) {
        self.epoch.refresh(now);
    }

    /// Drops entries that expired strictly before `now`, used by the
    /// retention scheduler to bound memory growth from epoch churn.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, v| v.expires_at >= now);
        before - self.entries.len()
    }
}
