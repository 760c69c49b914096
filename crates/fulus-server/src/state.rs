//! Composes every collaborator crate into the shared state handed to axum
//! handlers, plus a small keyring seam for resolving a user's signing
//! profile and payload key.
//!
//! A real deployment resolves [`UserKeyring`] against whatever holds
//! registered PINs/RSA keys (KYC/auth system); that collaborator isn't
//! modeled here, so [`InMemoryUserKeyring`] stands in as a reference
//! implementation callers can seed directly.

use async_trait::async_trait;
use dashmap::DashMap;
use fulus_chat::tools::{
    BudgetAssistantProvider, FunctionRegistry, InMemoryBudgetAssistant, InMemorySavingsCalculator, InMemoryStatementProvider,
    InMemoryTransactionHistory, SavingsCalculatorProvider, StatementProvider, TransactionHistoryProvider,
};
use fulus_chat::{AdminChatOrchestrator, ChatOrchestrator, LlmProvider, RetentionScheduler};
use fulus_sync::chain_state_store::{ChainStateStore, InMemoryChainStateStore};
use fulus_sync::conflict_store::{ConflictStore, InMemoryConflictStore};
use fulus_sync::ledger::{InMemoryLedger, Ledger};
use fulus_sync::nonce_registry::{InMemoryNonceRegistry, NonceRegistry};
use fulus_sync::offline_tx_store::{InMemoryOfflineTxStore, OfflineTxStore};
use fulus_sync::signature::SignerKey;
use fulus_sync::validator::ValidatorConfig;
use fulus_sync::SyncOrchestrator;
use std::sync::Arc;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("no signing key registered for user {0}")]
    UnknownUser(String),
}

/// Resolves a user's signature profile and payload encryption key. Both are
/// per-user secrets established at onboarding (PIN digest for HMAC, or a
/// registered RSA public key); this crate only consumes them.
#[async_trait]
pub trait UserKeyring: Send + Sync {
    async fn signer_key(&self, user_id: &str) -> Result<SignerKey, KeyringError>;
    async fn payload_key(&self, user_id: &str) -> Result<[u8; 32], KeyringError>;
}

#[derive(Clone)]
struct KeyringEntry {
    hmac_key: [u8; 32],
    payload_key: [u8; 32],
}

/// Reference keyring: derives both keys from a phone + PIN digest the way
/// the sync crate's own tests do, keyed by user id. Seed with
/// [`InMemoryUserKeyring::register`] before use; a real deployment replaces
/// this with a lookup against the auth/KYC store.
#[derive(Clone, Default)]
pub struct InMemoryUserKeyring {
    entries: Arc<DashMap<String, KeyringEntry>>,
}

impl InMemoryUserKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str, phone: &str, pin_digest: &str, pin: &str) {
        let hmac_key = fulus_sync::signature::derive_hmac_key(phone, pin_digest);
        let payload_key = fulus_sync::payload_codec::derive_payload_key(phone, pin);
        self.entries.insert(user_id.to_string(), KeyringEntry { hmac_key, payload_key });
    }
}

#[async_trait]
impl UserKeyring for InMemoryUserKeyring {
    async fn signer_key(&self, user_id: &str) -> Result<SignerKey, KeyringError> {
        let entry = self.entries.get(user_id).ok_or_else(|| KeyringError::UnknownUser(user_id.to_string()))?;
        Ok(SignerKey::Hmac { key: entry.hmac_key })
    }

    async fn payload_key(&self, user_id: &str) -> Result<[u8; 32], KeyringError> {
        let entry = self.entries.get(user_id).ok_or_else(|| KeyringError::UnknownUser(user_id.to_string()))?;
        Ok(entry.payload_key)
    }
}

/// Shared application state, cloned cheaply (everything behind an `Arc`)
/// into each request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sync_orchestrator: Arc<SyncOrchestrator>,
    pub chat_orchestrator: Arc<ChatOrchestrator>,
    pub admin_chat_orchestrator: Arc<AdminChatOrchestrator>,
    pub retention_scheduler: Arc<RetentionScheduler>,
    pub chain_state_store: Arc<dyn ChainStateStore>,
    pub conflict_store: Arc<dyn ConflictStore>,
    pub offline_tx_store: Arc<dyn OfflineTxStore>,
    pub ledger: Arc<dyn Ledger>,
    pub nonce_registry: Arc<dyn NonceRegistry>,
    pub keyring: Arc<dyn UserKeyring>,
}

impl AppState {
    pub fn build(config: Config, llm: Arc<dyn LlmProvider>, now: chrono::DateTime<chrono::Utc>) -> Self {
        let config = Arc::new(config);

        let chain_state_store: Arc<dyn ChainStateStore> = Arc::new(InMemoryChainStateStore::new());
        let conflict_store: Arc<dyn ConflictStore> = Arc::new(InMemoryConflictStore::new());
        let nonce_registry: Arc<dyn NonceRegistry> = Arc::new(InMemoryNonceRegistry::new());
        let offline_tx_store: Arc<dyn OfflineTxStore> = Arc::new(InMemoryOfflineTxStore::new());
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let keyring: Arc<dyn UserKeyring> = Arc::new(InMemoryUserKeyring::new());

        let validator_config = ValidatorConfig {
            max_age_days: config.offline.max_age_days,
            future_tolerance_minutes: config.offline.future_tolerance_minutes,
            max_amount: config.offline.max_amount,
        };

        let sync_orchestrator = Arc::new(SyncOrchestrator::new(
            chain_state_store.clone(),
            ledger.clone(),
            conflict_store.clone(),
            nonce_registry.clone(),
            offline_tx_store.clone(),
            validator_config,
        ));

        let conversation_store = Arc::new(fulus_chat::conversation::InMemoryConversationStore::new());
        let memory_cache = fulus_chat::memory_cache::ConversationMemoryCache::new(config.chat.memory.cache_ttl_seconds);
        let telemetry = Arc::new(fulus_chat::ChatTelemetry::new());

        let registry = Arc::new(FunctionRegistry::new(
            ledger.clone(),
            chain_state_store.clone(),
            conflict_store.clone(),
            Arc::new(InMemoryTransactionHistory::new()) as Arc<dyn TransactionHistoryProvider>,
            Arc::new(InMemoryStatementProvider::new()) as Arc<dyn StatementProvider>,
            Arc::new(InMemorySavingsCalculator::new()) as Arc<dyn SavingsCalculatorProvider>,
            Arc::new(InMemoryBudgetAssistant::new()) as Arc<dyn BudgetAssistantProvider>,
        ));

        let chat_orchestrator = Arc::new(ChatOrchestrator::new(
            conversation_store.clone(),
            memory_cache.clone(),
            registry,
            llm.clone(),
            telemetry.clone(),
            "You are the Fulus wallet assistant. Confirm explicit intent before moving money.",
            config.chat.memory.max_messages,
        ));

        let epoch = Arc::new(fulus_chat::insights_cache::StatsEpoch::new(now));
        let insights_cache = fulus_chat::insights_cache::InsightsCache::new(epoch);
        let rate_limiter = fulus_chat::rate_limiter::RateLimiter::new(config.insights.rate.minute, config.insights.rate.hour);
        let audit_log: Arc<dyn fulus_chat::audit_log::AuditLogStore> = Arc::new(fulus_chat::audit_log::InMemoryAuditLogStore::new());

        let admin_chat_orchestrator = Arc::new(AdminChatOrchestrator::new(
            llm,
            insights_cache.clone(),
            rate_limiter,
            audit_log,
            telemetry,
            "You summarize platform-wide business insights for Fulus operators.",
        ));

        let retention_scheduler = Arc::new(RetentionScheduler::new(
            nonce_registry.clone(),
            conflict_store.clone(),
            conversation_store,
            memory_cache,
            insights_cache,
            config.chat.prune_after_days,
            config.chat.prune_after_days,
        ));

        AppState {
            config,
            sync_orchestrator,
            chat_orchestrator,
            admin_chat_orchestrator,
            retention_scheduler,
            chain_state_store,
            conflict_store,
            offline_tx_store,
            ledger,
            nonce_registry,
            keyring,
        }
    }
}
