//! C15: Telemetry.
//!
//! Process-wide hit/miss and API-call counters, held behind a single
//! long-lived service object (per the design notes' "avoid scattering
//! globals as singletons") rather than as free-standing statics.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ChatTelemetry {
    llm_calls: AtomicU64,
    llm_retries: AtomicU64,
    tool_calls: AtomicU64,
    insights_cache_hits: AtomicU64,
    insights_cache_misses: AtomicU64,
    rate_limit_refusals: AtomicU64,
}

impl ChatTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_llm_call(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_retry(&self) {
        self.llm_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.insights_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.insights_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_refusal(&self) {
        self.rate_limit_refusals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChatTelemetrySnapshot {
        ChatTelemetrySnapshot {
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            llm_retries: self.llm_retries.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            insights_cache_hits: self.insights_cache_hits.load(Ordering::Relaxed),
            insights_cache_misses: self.insights_cache_misses.load(Ordering::Relaxed),
            rate_limit_refusals: self.rate_limit_refusals.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTelemetrySnapshot {
    pub llm_calls: u64,
    pub llm_retries: u64,
    pub tool_calls: u64,
    pub insights_cache_hits: u64,
    pub insights_cache_misses: u64,
    pub rate_limit_refusals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let telemetry = ChatTelemetry::new();
        telemetry.record_llm_call();
        telemetry.record_llm_call();
        telemetry.record_cache_hit();
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.llm_calls, 2);
        assert_eq!(snapshot.insights_cache_hits, 1);
        assert_eq!(snapshot.tool_calls, 0);
    }
}
