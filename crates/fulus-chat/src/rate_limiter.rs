//! C12 (rate-limiter half): per-admin sliding windows.
//!
//! Two windows apply simultaneously: 30 requests/minute and 100
//! requests/hour. A request consumes one minute-token up front; if the
//! minute check passes but the hour check then fails, the minute-token is
//! refunded so a refused request never shows up as spent capacity.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

pub const DEFAULT_PER_MINUTE: usize = 30;
pub const DEFAULT_PER_HOUR: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    MinuteExceeded,
    HourExceeded,
}

impl RefusalReason {
    pub fn message(self) -> &'static str {
        match self {
            RefusalReason::MinuteExceeded => "rate limit exceeded: too many requests in the last minute",
            RefusalReason::HourExceeded => "rate limit exceeded: too many requests in the last hour",
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    minute: Vec<DateTime<Utc>>,
    hour: Vec<DateTime<Utc>>,
}

/// Sliding-window rate limiter keyed by admin id.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    per_minute: usize,
    per_hour: usize,
}

impl RateLimiter {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        RateLimiter {
            windows: Arc::new(DashMap::new()),
            per_minute,
            per_hour,
        }
    }

    /// Attempts to admit one request for `admin_id` at `now`. On refusal,
    /// any minute-token consumed by this attempt is refunded before
    /// returning, so the admin's minute counter is left exactly as it was
    /// before the call.
    pub fn try_admit(&self, admin_id: &str, now: DateTime<Utc>) -> Result<(), RefusalReason> {
        let mut window = self.windows.entry(admin_id.to_string()).or_default();
        window.minute.retain(|t| *t > now - Duration::minutes(1));
        window.hour.retain(|t| *t > now - Duration::hours(1));

        if window.minute.len() >= self.per_minute {
            return Err(RefusalReason::MinuteExceeded);
        }

        // Tentatively consume the minute-token.
        window.minute.push(now);

        if window.hour.len() >= self.per_hour {
            // Refund: the hour window rejected the request, so the minute
            // token consumed above must not count against the admin.
            window.minute.pop();
            return Err(RefusalReason::HourExceeded);
        }

        window.hour.push(now);
        Ok(())
    }

    /// Current minute-window occupancy for an admin, used by tests and
    /// diagnostics.
    pub fn minute_count(&self, admin_id: &str, now: DateTime<Utc>) -> usize {
        self.windows
            .get(admin_id)
            .map(|w| w.minute.iter().filter(|t| **t > now - Duration::minutes(1)).count())
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PER_MINUTE, DEFAULT_PER_HOUR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn admits_within_both_windows() {
        let limiter = RateLimiter::new(30, 100);
        for i in 0..30 {
            assert!(limiter.try_admit("admin-1", ts(i)).is_ok());
        }
    }

    #[test]
    fn minute_window_refuses_the_31st_request() {
        let limiter = RateLimiter::new(30, 100);
        for i in 0..30 {
            limiter.try_admit("admin-1", ts(i)).unwrap();
        }
        assert_eq!(limiter.try_admit("admin-1", ts(30)), Err(RefusalReason::MinuteExceeded));
    }

    #[test]
    fn hour_exhaustion_refunds_the_minute_token() {
        let limiter = RateLimiter::new(30, 2);
        limiter.try_admit("admin-1", ts(0)).unwrap();
        limiter.try_admit("admin-1", ts(1)).unwrap();
        let before = limiter.minute_count("admin-1", ts(2));
        let result = limiter.try_admit("admin-1", ts(2));
        assert_eq!(result, Err(RefusalReason::HourExceeded));
        let after = limiter.minute_count("admin-1", ts(2));
        assert_eq!(before, after);
    }

    #[test]
    fn different_admins_have_independent_windows() {
        let limiter = RateLimiter::new(1, 100);
        limiter.try_admit("admin-1", ts(0)).unwrap();
        assert!(limiter.try_admit("admin-2", ts(0)).is_ok());
    }
}
