//! C1: HashChain primitives.
//!
//! `hash = SHA256(sender || recipient || amount || ISO8601(timestamp) || nonce || prev)`,
//! with `prev` being the genesis constant for a chain's first transaction.

use chrono::{DateTime, Utc};
use fulus_types::hexbytes::HexHash;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Computes the canonical transaction hash from its constituent fields.
pub fn compute_tx_hash(
    sender: &str,
    recipient: &str,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    nonce: &str,
    previous_hash: &HexHash,
) -> HexHash {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(amount.to_string().as_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(previous_hash.as_str().as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    HexHash::from_bytes(digest)
}

/// Recomputes the hash for `tx`'s fields and compares it to `tx.tx_hash` in
/// constant time so a timing side-channel can't leak hash bytes.
pub fn verify_tx_hash(
    sender: &str,
    recipient: &str,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    nonce: &str,
    previous_hash: &HexHash,
    claimed: &HexHash,
) -> bool {
    let computed = compute_tx_hash(sender, recipient, amount, timestamp, nonce, previous_hash);
    constant_time_hash_eq(&computed, claimed)
}

fn constant_time_hash_eq(a: &HexHash, b: &HexHash) -> bool {
    let (Ok(a_bytes), Ok(b_bytes)) = (a.to_bytes(), b.to_bytes()) else {
        return false;
    };
    a_bytes.ct_eq(&b_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn hash_is_deterministic() {
        let genesis = HexHash::genesis();
        let h1 = compute_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2500, 0), ts(), "a".repeat(32).as_str(), &genesis);
        let h2 = compute_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2500, 0), ts(), "a".repeat(32).as_str(), &genesis);
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_with_any_field() {
        let genesis = HexHash::genesis();
        let base = compute_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2500, 0), ts(), "a".repeat(32).as_str(), &genesis);
        let changed_amount = compute_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2501, 0), ts(), "a".repeat(32).as_str(), &genesis);
        assert_ne!(base, changed_amount);
    }

    #[test]
    fn verify_round_trips() {
        let genesis = HexHash::genesis();
        let hash = compute_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2500, 0), ts(), "a".repeat(32).as_str(), &genesis);
        assert!(verify_tx_hash("+2348000000001", "+2348000000002", Decimal::new(2500, 0), ts(), "a".repeat(32).as_str(), &genesis, &hash));
        assert!(!verify_tx_hash("+2348000000001", "+2348000000002", Decimal::new(9999, 0), ts(), "a".repeat(32).as_str(), &genesis, &hash));
    }
}
