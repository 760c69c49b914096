//! The six literal end-to-end scenarios a correct sync engine must handle,
//! using the exact inputs they're described with: fresh chain, chained
//! transfers, a broken link, replay of an already-synced transaction,
//! nonce reuse under a different hash, and an overdraft inside an
//! otherwise-valid chain.

use chrono::{DateTime, Utc};
use fulus_sync::chain_state_store::{ChainStateStore, InMemoryChainStateStore};
use fulus_sync::conflict_store::InMemoryConflictStore;
use fulus_sync::hash_chain::compute_tx_hash;
use fulus_sync::ledger::InMemoryLedger;
use fulus_sync::nonce_registry::InMemoryNonceRegistry;
use fulus_sync::offline_tx_store::InMemoryOfflineTxStore;
use fulus_sync::payload_codec::{self, derive_payload_key};
use fulus_sync::signature::{derive_hmac_key, sign_hmac, SignerKey};
use fulus_sync::validator::ValidatorConfig;
use fulus_sync::SyncOrchestrator;
use fulus_types::hexbytes::HexHash;
use fulus_types::offline_tx::{OfflineTx, TxStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

const USER_A: &str = "+2348000000001";
const USER_B: &str = "+2348000000002";
const USER_C: &str = "+2348000000003";

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn ngn(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn signer_key(phone: &str) -> SignerKey {
    SignerKey::Hmac { key: derive_hmac_key(phone, "pin-digest") }
}

fn payload_key(phone: &str) -> [u8; 32] {
    derive_payload_key(phone, "1234")
}

#[allow(clippy::too_many_arguments)]
fn make_tx(sender: &str, recipient: &str, amount: Decimal, t: DateTime<Utc>, nonce: &str, previous_hash: HexHash) -> OfflineTx {
    let hash = compute_tx_hash(sender, recipient, amount, t, nonce, &previous_hash);
    let key = derive_hmac_key(sender, "pin-digest");
    let sig = sign_hmac(&hash, &key).unwrap();
    let payload = payload_codec::encrypt(b"{}", &payload_key(sender)).unwrap();
    OfflineTx {
        id: Uuid::new_v4(),
        sender_phone: sender.to_string(),
        recipient_phone: recipient.to_string(),
        amount,
        timestamp: t,
        nonce: nonce.to_string(),
        payload,
        tx_hash: hash,
        previous_hash,
        signature: sig,
        status: TxStatus::Pending,
        sync_attempts: 0,
        last_sync_attempt: None,
        sync_error: None,
        online_tx_id: None,
    }
}

struct Harness {
    orchestrator: SyncOrchestrator,
    chain_state_store: Arc<InMemoryChainStateStore>,
    ledger: InMemoryLedger,
}

fn harness(starting_balance: Decimal) -> Harness {
    let chain_state_store = Arc::new(InMemoryChainStateStore::new());
    let ledger = InMemoryLedger::new();
    ledger.seed(USER_A, starting_balance);
    let orchestrator = SyncOrchestrator::new(
        chain_state_store.clone(),
        Arc::new(ledger.clone()),
        Arc::new(InMemoryConflictStore::new()),
        Arc::new(InMemoryNonceRegistry::new()),
        Arc::new(InMemoryOfflineTxStore::new()),
        ValidatorConfig::default(),
    );
    Harness { orchestrator, chain_state_store, ledger }
}

#[tokio::test]
async fn scenario_1_fresh_chain_one_transfer() {
    let h = harness(ngn(1_000_000));
    let t1 = make_tx(USER_A, USER_B, ngn(250_000), ts(0), &"1".repeat(32), HexHash::genesis());
    let t1_hash = t1.tx_hash.clone();

    let result = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t1], &signer_key(USER_A), &payload_key(USER_A), ts(0))
        .await;

    assert_eq!(result.success, 1);
    assert!(result.outcomes.iter().all(|o| o.status == TxStatus::Synced));
    assert_eq!(result.last_synced_hash, t1_hash);
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(750_000));
    assert!(h.chain_state_store.load(USER_A).await.unwrap().chain_valid);
}

#[tokio::test]
async fn scenario_2_two_transfer_chain() {
    let h = harness(ngn(1_000_000));
    let t1 = make_tx(USER_A, USER_B, ngn(250_000), ts(0), &"1".repeat(32), HexHash::genesis());
    let t1_hash = t1.tx_hash.clone();
    h.orchestrator.sync(USER_A, USER_A, vec![t1], &signer_key(USER_A), &payload_key(USER_A), ts(0)).await;

    let t2 = make_tx(USER_A, USER_B, ngn(300_000), ts(10), &"2".repeat(32), t1_hash.clone());
    let t2_hash = t2.tx_hash.clone();
    let t3 = make_tx(USER_A, USER_C, ngn(100_000), ts(15), &"3".repeat(32), t2_hash.clone());
    let t3_hash = t3.tx_hash.clone();

    let result = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t2, t3], &signer_key(USER_A), &payload_key(USER_A), ts(15))
        .await;

    assert_eq!(result.success, 2);
    assert_eq!(result.last_synced_hash, t3_hash);
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(350_000));
}

#[tokio::test]
async fn scenario_3_broken_link_invalidates_chain() {
    let h = harness(ngn(1_000_000));
    let t1 = make_tx(USER_A, USER_B, ngn(250_000), ts(0), &"1".repeat(32), HexHash::genesis());
    let t1_hash = t1.tx_hash.clone();
    h.orchestrator.sync(USER_A, USER_A, vec![t1], &signer_key(USER_A), &payload_key(USER_A), ts(0)).await;

    let bogus_prev = HexHash::parse("f".repeat(64)).unwrap();
    let t4 = make_tx(USER_A, USER_B, ngn(50_000), ts(20), &"4".repeat(32), bogus_prev.clone());

    let result = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t4], &signer_key(USER_A), &payload_key(USER_A), ts(20))
        .await;

    assert_eq!(result.success, 0);
    assert!(result.failure.is_some());
    let state = h.chain_state_store.load(USER_A).await.unwrap();
    assert!(!state.chain_valid);
    assert_eq!(state.current_head_hash, t1_hash);
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(750_000));
}

#[tokio::test]
async fn scenario_4_replay_of_already_synced_transaction() {
    let h = harness(ngn(1_000_000));
    let t1 = make_tx(USER_A, USER_B, ngn(250_000), ts(0), &"1".repeat(32), HexHash::genesis());
    h.orchestrator.sync(USER_A, USER_A, vec![t1.clone()], &signer_key(USER_A), &payload_key(USER_A), ts(0)).await;

    let replay = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t1], &signer_key(USER_A), &payload_key(USER_A), ts(30))
        .await;

    assert_eq!(replay.success, 0);
    assert_eq!(replay.conflict, 1);
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(750_000));
}

#[tokio::test]
async fn scenario_5_nonce_reuse_with_fresh_hash() {
    let h = harness(ngn(1_000_000));
    let t1 = make_tx(USER_A, USER_B, ngn(250_000), ts(0), &"1".repeat(32), HexHash::genesis());
    let t1_hash = t1.tx_hash.clone();
    h.orchestrator.sync(USER_A, USER_A, vec![t1], &signer_key(USER_A), &payload_key(USER_A), ts(0)).await;

    // Same nonce as T1 but a different amount, so a different txHash.
    let t5 = make_tx(USER_A, USER_B, ngn(400_000), ts(40), "1".repeat(32).as_str(), t1_hash.clone());

    let result = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t5], &signer_key(USER_A), &payload_key(USER_A), ts(40))
        .await;

    assert_eq!(result.failed, 1);
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(750_000));
}

#[tokio::test]
async fn scenario_6_overdraft_inside_valid_chain() {
    let h = harness(ngn(350_000));
    let t6 = make_tx(USER_A, USER_B, ngn(500_000), ts(0), &"6".repeat(32), HexHash::genesis());

    let result = h
        .orchestrator
        .sync(USER_A, USER_A, vec![t6], &signer_key(USER_A), &payload_key(USER_A), ts(0))
        .await;

    assert_eq!(result.failed, 1);
    let state = h.chain_state_store.load(USER_A).await.unwrap();
    assert!(state.chain_valid);
    assert_eq!(state.current_head_hash, HexHash::genesis());
    assert_eq!(h.ledger.balance(USER_A).await.unwrap(), ngn(350_000));
}
