//! `offline-query` tool: lets the assistant explain a user's sync chain
//! state and any unresolved conflicts in plain English, without the user
//! needing to know what a hash chain or a conflict code is.

use crate::error::ChatError;
use chrono::{DateTime, Utc};
use fulus_sync::chain_state_store::ChainStateStore;
use fulus_sync::conflict_store::ConflictStore;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct OfflineQueryResult {
    pub chain_valid: bool,
    pub synced_count: u64,
    pub pending_count: u64,
    pub failed_count: u64,
    pub conflict_count: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub unresolved_conflicts: Vec<String>,
}

pub async fn handle(
    chain_state_store: &dyn ChainStateStore,
    conflict_store: &dyn ConflictStore,
    user_id: &str,
    _now: DateTime<Utc>,
) -> Result<serde_json::Value, ChatError> {
    let state = chain_state_store.load(user_id).await;
    let unresolved = conflict_store.unresolved_for_user(user_id).await;
    let mut explanations = Vec::with_capacity(unresolved.len());
    for conflict in &unresolved {
        if let Some(explanation) = conflict_store.explain(conflict.id).await {
            explanations.push(explanation);
        }
    }

    let result = match state {
        Some(state) => OfflineQueryResult {
            chain_valid: state.chain_valid,
            synced_count: state.counters.synced,
            pending_count: state.counters.pending,
            failed_count: state.counters.failed,
            conflict_count: state.counters.conflict,
            last_synced_at: state.last_synced_at,
            unresolved_conflicts: explanations,
        },
        None => OfflineQueryResult {
            chain_valid: true,
            synced_count: 0,
            pending_count: 0,
            failed_count: 0,
            conflict_count: 0,
            last_synced_at: None,
            unresolved_conflicts: Vec::new(),
        },
    };
    Ok(serde_json::to_value(result).unwrap())
}
