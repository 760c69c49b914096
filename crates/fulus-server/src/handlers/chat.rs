//! `/chat` and `/chat/admin` handlers.
//!
//! IP whitelist enforcement for the admin surface lives here (the HTTP
//! boundary), per the split documented on
//! [`fulus_chat::AdminChatOrchestrator::handle_admin_turn`].

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    pub user_phone: String,
    pub message: String,
    #[serde(default = "default_use_memory")]
    pub use_memory: bool,
}

fn default_use_memory() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub message_count: u32,
}

#[instrument(skip_all, fields(user_id = %request.user_id))]
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let now = Utc::now();
    let result = state
        .chat_orchestrator
        .handle_user_turn(&request.user_id, &request.user_phone, &request.message, request.use_memory, now)
        .await?;
    Ok(Json(ChatResponse { response: result.response, message_count: result.message_count }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminChatRequest {
    pub admin_id: String,
    pub message: String,
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub include_charts: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminChatResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub cached: bool,
}

/// `includeCharts` is accepted for forward compatibility with a charting
/// client but doesn't change this core's response payload.
#[instrument(skip_all, fields(admin_id = %request.admin_id))]
pub async fn chat_admin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<AdminChatRequest>,
) -> Result<Json<AdminChatResponse>, ApiError> {
    let ip = addr.ip();
    if !state.config.admin_ip_allowlist.is_empty() && !state.config.admin_ip_allowlist.contains(&ip) {
        return Err(ApiError::Chat(fulus_chat::ChatError::Authz(format!("{ip} is not on the admin allowlist"))));
    }
    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);

    let now = Utc::now();
    let result = state
        .admin_chat_orchestrator
        .handle_admin_turn(&request.admin_id, &request.message, request.conversation_id, Some(ip.to_string()), user_agent, now)
        .await?;
    Ok(Json(AdminChatResponse { response: result.response, conversation_id: result.conversation_id, cached: result.cached }))
}
