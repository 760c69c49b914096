//! `/sync/*` handlers: thin HTTP adapters over [`fulus_sync::SyncOrchestrator`]
//! and the read-only store handles in [`AppState`].

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use fulus_sync::chain_state_store::ChainStateStore;
use fulus_sync::conflict_store::ConflictStore;
use fulus_sync::ledger::Ledger;
use fulus_sync::offline_tx_store::OfflineTxStore;
use fulus_types::conflict::SyncConflict;
use fulus_types::offline_tx::OfflineTxWire;
use fulus_types::{ChainState, SyncResult};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::{AppState, UserKeyring};

const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOfflineRequest {
    pub user_id: String,
    pub user_phone: String,
    pub transactions: Vec<OfflineTxWire>,
}

#[instrument(skip_all, fields(user_id = %request.user_id))]
pub async fn sync_offline(State(state): State<AppState>, Json(request): Json<SyncOfflineRequest>) -> Result<Json<SyncResult>, ApiError> {
    if request.transactions.len() > MAX_BATCH {
        return Err(ApiError::BatchTooLarge { max: MAX_BATCH });
    }
    let now = Utc::now();
    let signer_key = state.keyring.signer_key(&request.user_id).await?;
    let payload_key = state.keyring.payload_key(&request.user_id).await?;
    let batch = request.transactions.into_iter().map(Into::into).collect();
    let result = state
        .sync_orchestrator
        .sync(&request.user_id, &request.user_phone, batch, &signer_key, &payload_key, now)
        .await;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncValidateRequest {
    pub user_id: String,
    pub user_phone: String,
    pub transactions: Vec<OfflineTxWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncValidateResponse {
    pub reports: fulus_sync::validator::ValidationReports,
}

#[instrument(skip_all, fields(user_id = %request.user_id))]
pub async fn sync_validate(
    State(state): State<AppState>,
    Json(request): Json<SyncValidateRequest>,
) -> Result<Json<SyncValidateResponse>, ApiError> {
    let now = Utc::now();
    let signer_key = state.keyring.signer_key(&request.user_id).await?;
    let payload_key = state.keyring.payload_key(&request.user_id).await?;
    let starting_balance = state.ledger.balance(&request.user_id).await.unwrap_or_default();
    let batch: Vec<_> = request.transactions.into_iter().map(Into::into).collect();
    let reports = state
        .sync_orchestrator
        .validate_only(&request.user_id, &request.user_phone, &batch, &signer_key, &payload_key, starting_balance, now)
        .await;
    Ok(Json(SyncValidateResponse { reports }))
}

#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn get_chain_state(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<ChainState>, ApiError> {
    let now = Utc::now();
    let chain_state = state.chain_state_store.load_or_create(&user_id, now).await;
    Ok(Json(chain_state))
}

#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn get_conflicts(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<Vec<SyncConflict>> {
    let conflicts = state.conflict_store.unresolved_for_user(&user_id).await;
    Json(conflicts)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub user_id: String,
    pub retried: usize,
    pub result: SyncResult,
}

/// Moves every `FAILED` entry for `userId` back to `PENDING` and replays
/// them through the same orchestrator entrypoint as a fresh batch.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn retry_failed(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<RetryResponse>, ApiError> {
    let now = Utc::now();
    let reset = state.offline_tx_store.reset_failed_for_retry(&user_id).await;
    let retried = reset.len();
    let signer_key = state.keyring.signer_key(&user_id).await?;
    let payload_key = state.keyring.payload_key(&user_id).await?;
    let result = state.sync_orchestrator.sync(&user_id, &user_id, reset, &signer_key, &payload_key, now).await;
    Ok(Json(RetryResponse { user_id, retried, result }))
}
