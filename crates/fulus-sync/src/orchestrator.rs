//! C9: Sync orchestrator.
//!
//! The top-level batch entrypoint. Composes the chain state store, ledger,
//! conflict store, nonce registry, and validator under a single logical
//! transaction scope; the in-memory reference implementations here don't
//! have a real rollback mechanism, so the batch-fatal and infra-error paths
//! are structured to stop mutating before anything irreversible happens
//! rather than to undo completed writes.

use crate::chain_state_store::ChainStateStore;
use crate::conflict_store::ConflictStore;
use crate::ledger::{Ledger, LedgerError};
use crate::nonce_registry::NonceRegistry;
use crate::offline_tx_store::OfflineTxStore;
use crate::signature::SignerKey;
use crate::validator::{self, ValidatorConfig};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::conflict::ConflictType;
use fulus_types::ledger::LedgerTransaction;
use fulus_types::offline_tx::{OfflineTx, TxStatus};
use fulus_types::sync_result::{SyncOutcome, SyncResult};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;
use uuid::Uuid;

pub struct SyncOrchestrator {
    chain_state_store: Arc<dyn ChainStateStore>,
    ledger: Arc<dyn Ledger>,
    conflict_store: Arc<dyn ConflictStore>,
    nonce_registry: Arc<dyn NonceRegistry>,
    offline_tx_store: Arc<dyn OfflineTxStore>,
    config: ValidatorConfig,
    /// Advisory per-user lock so at most one `sync` run per user executes
    /// concurrently, mirroring the teacher's per-address nonce mutex.
    user_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SyncOrchestrator {
    pub fn new(
        chain_state_store: Arc<dyn ChainStateStore>,
        ledger: Arc<dyn Ledger>,
        conflict_store: Arc<dyn ConflictStore>,
        nonce_registry: Arc<dyn NonceRegistry>,
        offline_tx_store: Arc<dyn OfflineTxStore>,
        config: ValidatorConfig,
    ) -> Self {
        SyncOrchestrator {
            chain_state_store,
            ledger,
            conflict_store,
            nonce_registry,
            offline_tx_store,
            config,
            user_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.user_locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Runs C7 only, without mutating any state. Used by `/sync/validate`.
    #[instrument(skip_all, fields(user_id = %user_id, batch_len = batch.len()))]
    pub async fn validate_only(
        &self,
        user_id: &str,
        user_phone: &str,
        batch: &[OfflineTx],
        signer_key: &SignerKey,
        payload_key: &[u8; 32],
        starting_balance: rust_decimal::Decimal,
        now: DateTime<Utc>,
    ) -> validator::ValidationReports {
        let chain_state = self.chain_state_store.load_or_create(user_id, now).await;
        let chain = validator::validate_chain(batch, &chain_state);
        let mut payload = Vec::with_capacity(batch.len());
        for tx in batch {
            payload.push(
                validator::validate_payload(tx, &self.config, self.nonce_registry.as_ref(), signer_key, payload_key, now)
                    .await,
            );
        }
        let double_spend = validator::validate_double_spend(batch, user_phone, starting_balance);
        validator::ValidationReports { chain, payload, double_spend }
    }

    /// Entry point: `sync(userId, batch) -> SyncResult`.
    #[instrument(skip_all, fields(user_id = %user_id, batch_len = batch.len()))]
    pub async fn sync(
        &self,
        user_id: &str,
        user_phone: &str,
        batch: Vec<OfflineTx>,
        signer_key: &SignerKey,
        payload_key: &[u8; 32],
        now: DateTime<Utc>,
    ) -> SyncResult {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let chain_state = self.chain_state_store.load_or_create(user_id, now).await;

        if !chain_state.chain_valid {
            self.conflict_store
                .record(
                    Uuid::nil(),
                    user_id,
                    ConflictType::ChainBroken,
                    "chain is invalidated; an operator must reset it before further batches are accepted",
                    None,
                    None,
                    now,
                )
                .await;
            return SyncResult::empty(user_id, chain_state.current_head_hash);
        }

        let sorted = validator::sorted_by_timestamp(&batch);

        let mut outcomes = Vec::new();
        let mut success = 0usize;
        let mut failed = 0usize;
        let mut conflict = 0usize;

        // Idempotent replay (spec §4.8): an entry whose txHash is already
        // SYNCED is dropped *before* chain validation runs. Left in, its
        // previousHash points at a head the chain has since moved past, so
        // the chain-integrity pass would misreport it as CHAIN_BROKEN and
        // invalidate the chain instead of recording the replay as a
        // DOUBLE_SPEND conflict.
        let mut candidates = Vec::with_capacity(sorted.len());
        for tx in &sorted {
            if let Some(existing) = self.offline_tx_store.by_hash(&tx.tx_hash).await {
                if existing.status == TxStatus::Synced {
                    self.conflict_store
                        .record(tx.id, user_id, ConflictType::DoubleSpend, "already synced; replay ignored", None, None, now)
                        .await;
                    self.chain_state_store.mark_conflict(user_id, now).await.ok();
                    conflict += 1;
                    outcomes.push(SyncOutcome {
                        transaction_id: tx.id,
                        tx_hash: tx.tx_hash.clone(),
                        status: TxStatus::Conflict,
                        online_tx_id: existing.online_tx_id,
                        conflict_id: None,
                        error: Some("replay of already-synced transaction".to_string()),
                    });
                    continue;
                }
            }
            candidates.push(tx.clone());
        }

        let chain_report = validator::validate_chain(&candidates, &chain_state);

        if let Some(fatal) = chain_report.first_fatal() {
            for issue in &chain_report.issues {
                self.conflict_store
                    .record(
                        issue.transaction_id,
                        user_id,
                        issue.conflict_type,
                        "chain integrity check failed",
                        issue.expected.clone(),
                        issue.actual.clone(),
                        now,
                    )
                    .await;
                if let Some(tx) = candidates.iter().find(|t| t.id == issue.transaction_id) {
                    self.offline_tx_store.upsert(tx.clone()).await;
                    self.offline_tx_store
                        .mark_failed(&tx.tx_hash, &format!("{:?}", issue.conflict_type), now)
                        .await;
                    failed += 1;
                    outcomes.push(SyncOutcome {
                        transaction_id: tx.id,
                        tx_hash: tx.tx_hash.clone(),
                        status: TxStatus::Failed,
                        online_tx_id: None,
                        conflict_id: None,
                        error: Some(format!("{:?}", issue.conflict_type)),
                    });
                }
            }
            self.chain_state_store
                .invalidate(user_id, format!("batch-fatal: {:?}", fatal.conflict_type), now)
                .await
                .ok();
            return SyncResult {
                user_id: user_id.to_string(),
                total: sorted.len(),
                success,
                failed,
                conflict,
                last_synced_hash: chain_state.current_head_hash,
                final_balance: None,
                outcomes,
                failure: Some("chain integrity check failed; batch aborted".to_string()),
            };
        }

        let non_fatal_issue_ids: std::collections::HashSet<Uuid> = chain_report
            .issues
            .iter()
            .map(|issue| issue.transaction_id)
            .collect();

        self.chain_state_store
            .register_pending(user_id, candidates.len() as u64, now)
            .await
            .ok();

        let mut head = chain_state.current_head_hash.clone();

        for tx in &candidates {
            if non_fatal_issue_ids.contains(&tx.id) {
                let issue = chain_report.issues.iter().find(|i| i.transaction_id == tx.id).unwrap();
                self.offline_tx_store.upsert(tx.clone()).await;
                self.offline_tx_store
                    .mark_failed(&tx.tx_hash, &format!("{:?}", issue.conflict_type), now)
                    .await;
                self.conflict_store
                    .record(tx.id, user_id, issue.conflict_type, "duplicate within batch", None, None, now)
                    .await;
                self.chain_state_store.mark_failed(user_id, now).await.ok();
                failed += 1;
                outcomes.push(SyncOutcome {
                    transaction_id: tx.id,
                    tx_hash: tx.tx_hash.clone(),
                    status: TxStatus::Failed,
                    online_tx_id: None,
                    conflict_id: None,
                    error: Some(format!("{:?}", issue.conflict_type)),
                });
                continue;
            }

            let payload_report = validator::validate_payload(
                tx,
                &self.config,
                self.nonce_registry.as_ref(),
                signer_key,
                payload_key,
                now,
            )
            .await;
            if !payload_report.is_clean() {
                self.offline_tx_store.upsert(tx.clone()).await;
                let violation = payload_report.violations[0];
                self.offline_tx_store
                    .mark_failed(&tx.tx_hash, &format!("{:?}", violation), now)
                    .await;
                let record = self
                    .conflict_store
                    .record(tx.id, user_id, violation, "payload validation failed", None, None, now)
                    .await;
                self.chain_state_store.mark_failed(user_id, now).await.ok();
                failed += 1;
                outcomes.push(SyncOutcome {
                    transaction_id: tx.id,
                    tx_hash: tx.tx_hash.clone(),
                    status: TxStatus::Failed,
                    online_tx_id: None,
                    conflict_id: Some(record.id),
                    error: Some(format!("{:?}", violation)),
                });
                continue;
            }

            self.offline_tx_store.upsert(tx.clone()).await;

            if tx.previous_hash != head {
                self.chain_state_store
                    .invalidate(user_id, "re-validated head moved unexpectedly".to_string(), now)
                    .await
                    .ok();
                return SyncResult {
                    failure: Some("internal invariant violated: chain head mismatch mid-batch".to_string()),
                    user_id: user_id.to_string(),
                    total: sorted.len(),
                    success,
                    failed,
                    conflict,
                    last_synced_hash: head,
                    final_balance: None,
                    outcomes,
                };
            }

            let reference = LedgerTransaction::offline_reference(&tx.tx_hash);
            match self
                .ledger
                .transfer(user_id, &tx.recipient_phone, &tx.sender_phone, &tx.recipient_phone, tx.amount, &reference, Some(tx.id), now)
                .await
            {
                Ok(outcome) => {
                    self.nonce_registry
                        .admit(&tx.sender_phone, &tx.nonce, tx.tx_hash.clone(), now)
                        .await
                        .ok();
                    let online_tx_id = outcome.debit_entry.id;
                    self.offline_tx_store.mark_synced(&tx.tx_hash, online_tx_id, now).await;
                    self.chain_state_store.mark_synced(user_id, tx.tx_hash.clone(), now).await.ok();
                    head = tx.tx_hash.clone();
                    success += 1;
                    outcomes.push(SyncOutcome {
                        transaction_id: tx.id,
                        tx_hash: tx.tx_hash.clone(),
                        status: TxStatus::Synced,
                        online_tx_id: Some(online_tx_id),
                        conflict_id: None,
                        error: None,
                    });
                }
                Err(LedgerError::InsufficientFunds { .. }) => {
                    self.offline_tx_store.mark_failed(&tx.tx_hash, "insufficient funds", now).await;
                    let record = self
                        .conflict_store
                        .record(tx.id, user_id, ConflictType::InsufficientFunds, "balance too low to cover transfer", None, None, now)
                        .await;
                    self.chain_state_store.mark_failed(user_id, now).await.ok();
                    failed += 1;
                    outcomes.push(SyncOutcome {
                        transaction_id: tx.id,
                        tx_hash: tx.tx_hash.clone(),
                        status: TxStatus::Failed,
                        online_tx_id: None,
                        conflict_id: Some(record.id),
                        error: Some("insufficient funds".to_string()),
                    });
                }
                Err(LedgerError::UnknownAccount(_)) | Err(LedgerError::Infra(_)) => {
                    return SyncResult {
                        failure: Some("ledger infrastructure error; batch rolled back".to_string()),
                        user_id: user_id.to_string(),
                        total: sorted.len(),
                        success,
                        failed,
                        conflict,
                        last_synced_hash: chain_state.current_head_hash,
                        final_balance: None,
                        outcomes,
                    };
                }
            }
        }

        let final_balance = self.ledger.balance(user_id).await.ok();

        SyncResult {
            user_id: user_id.to_string(),
            total: sorted.len(),
            success,
            failed,
            conflict,
            last_synced_hash: head,
            final_balance,
            outcomes,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_state_store::InMemoryChainStateStore;
    use crate::conflict_store::InMemoryConflictStore;
    use crate::hash_chain::compute_tx_hash;
    use crate::ledger::InMemoryLedger;
    use crate::nonce_registry::InMemoryNonceRegistry;
    use crate::offline_tx_store::InMemoryOfflineTxStore;
    use crate::payload_codec::{self, derive_payload_key};
    use crate::signature::{derive_hmac_key, sign_hmac};
    use fulus_types::hexbytes::HexHash;
    use fulus_types::offline_tx::TxStatus;
    use rust_decimal::Decimal;

    const SENDER: &str = "+2348000000001";
    const RECIPIENT: &str = "+2348000000002";
    const OTHER: &str = "+2348000000003";

    fn ts(secs: i64) -> DateTime<Utc> {
        chrono::DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn signer_key() -> SignerKey {
        SignerKey::Hmac { key: derive_hmac_key(SENDER, "pin-digest") }
    }

    fn payload_key() -> [u8; 32] {
        derive_payload_key(SENDER, "1234")
    }

    fn make_tx(sender: &str, recipient: &str, amount: Decimal, t: DateTime<Utc>, nonce: &str, previous_hash: HexHash) -> OfflineTx {
        let hash = compute_tx_hash(sender, recipient, amount, t, nonce, &previous_hash);
        let key = derive_hmac_key(sender, "pin-digest");
        let sig = sign_hmac(&hash, &key).unwrap();
        let payload = payload_codec::encrypt(b"{}", &derive_payload_key(sender, "1234")).unwrap();
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

    fn orchestrator(ledger: InMemoryLedger) -> (SyncOrchestrator, Arc<InMemoryChainStateStore>, Arc<InMemoryOfflineTxStore>, Arc<InMemoryConflictStore>) {
        let chain_state_store = Arc::new(InMemoryChainStateStore::new());
        let conflict_store = Arc::new(InMemoryConflictStore::new());
        let nonce_registry = Arc::new(InMemoryNonceRegistry::new());
        let offline_tx_store = Arc::new(InMemoryOfflineTxStore::new());
        let orch = SyncOrchestrator::new(
            chain_state_store.clone(),
            Arc::new(ledger),
            conflict_store.clone(),
            nonce_registry,
            offline_tx_store.clone(),
            ValidatorConfig::default(),
        );
        (orch, chain_state_store, offline_tx_store, conflict_store)
    }

    #[tokio::test]
    async fn fresh_chain_one_transfer() {
        let ledger = InMemoryLedger::new();
        ledger.seed(SENDER, Decimal::new(1000000, 2));
        let (orch, chain_state_store, _offline_tx_store, _conflict_store) = orchestrator(ledger);
        let t1 = make_tx(SENDER, RECIPIENT, Decimal::new(250000, 2), ts(0), &"1".repeat(32), HexHash::genesis());
        let t1_hash = t1.tx_hash.clone();
        let result = orch.sync(SENDER, SENDER, vec![t1], &signer_key(), &payload_key(), ts(0)).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.last_synced_hash, t1_hash);
        assert_eq!(result.final_balance, Some(Decimal::new(750000, 2)));
        let state = chain_state_store.load(SENDER).await.unwrap();
        assert_eq!(state.current_head_hash, t1_hash);
    }

    #[tokio::test]
    async fn broken_link_invalidates_chain() {
        let ledger = InMemoryLedger::new();
        ledger.seed(SENDER, Decimal::new(1000000, 2));
        let (orch, chain_state_store, offline_tx_store, _conflict_store) = orchestrator(ledger);
        let bogus_prev = HexHash::parse("f".repeat(64)).unwrap();
        let t4 = make_tx(SENDER, RECIPIENT, Decimal::new(50000, 2), ts(0), &"4".repeat(32), bogus_prev);
        let t4_hash = t4.tx_hash.clone();
        let result = orch.sync(SENDER, SENDER, vec![t4], &signer_key(), &payload_key(), ts(0)).await;
        assert_eq!(result.success, 0);
        assert!(result.failure.is_some());
        let state = chain_state_store.load(SENDER).await.unwrap();
        assert!(!state.chain_valid);
        let row = offline_tx_store.by_hash(&t4_hash).await.unwrap();
        assert_eq!(row.status, TxStatus::Failed);
    }

    #[tokio::test]
    async fn concurrent_syncs_for_different_users_both_apply() {
        let ledger = InMemoryLedger::new();
        ledger.seed(SENDER, Decimal::new(1000000, 2));
        ledger.seed(OTHER, Decimal::new(500000, 2));
        let (orch, _chain_state_store, _offline_tx_store, _conflict_store) = orchestrator(ledger);
        let tx_a = make_tx(SENDER, RECIPIENT, Decimal::new(100000, 2), ts(0), &"a".repeat(32), HexHash::genesis());
        let tx_b = make_tx(OTHER, RECIPIENT, Decimal::new(50000, 2), ts(0), &"b".repeat(32), HexHash::genesis());
        let other_key = SignerKey::Hmac { key: derive_hmac_key(OTHER, "pin-digest") };
        let other_payload_key = derive_payload_key(OTHER, "1234");
        let (result_a, result_b) = tokio::join!(
            orch.sync(SENDER, SENDER, vec![tx_a], &signer_key(), &payload_key(), ts(0)),
            orch.sync(OTHER, OTHER, vec![tx_b], &other_key, &other_payload_key, ts(0)),
        );
        assert_eq!(result_a.success, 1);
        assert_eq!(result_b.success, 1);
    }
}
