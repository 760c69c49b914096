//! Used-nonce registry record.

use crate::hexbytes::HexHash;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Retention window for admitted nonces: 7 days.
pub const RETENTION_DAYS: i64 = 7;

/// A nonce that has been admitted by the [`crate`] registry, recorded so a
/// second submission with the same nonce is rejected until it expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedNonce {
    pub nonce: String,
    pub user_id: String,
    pub used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tx_hash: HexHash,
}

impl UsedNonce {
    pub fn new(nonce: impl Into<String>, user_id: impl Into<String>, tx_hash: HexHash, now: DateTime<Utc>) -> Self {
        UsedNonce {
            nonce: nonce.into(),
            user_id: user_id.into(),
            used_at: now,
            expires_at: now + Duration::days(RETENTION_DAYS),
            tx_hash,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
