//! Maps collaborator error enums onto HTTP responses, in the shape of the
//! teacher's `impl IntoResponse for FacilitatorLocalError`: one JSON error
//! body, status code chosen per error variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fulus_chat::ChatError;
use serde::Serialize;

use crate::state::KeyringError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Keyring(#[from] KeyringError),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("batch exceeds maximum size of {max}")]
    BatchTooLarge { max: usize },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Chat(ChatError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Chat(ChatError::ConflictNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Chat(ChatError::UnknownTool(_)) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::InvalidToolArgs { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Chat(ChatError::IntentNotConfirmed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Chat(ChatError::SpeculativeWriteRefused(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Chat(ChatError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Chat(ChatError::Authz(_)) => StatusCode::FORBIDDEN,
            ApiError::Chat(ChatError::UpstreamLlm(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Chat(ChatError::SyncCollaborator(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Keyring(KeyringError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            ApiError::UnknownUser(_) => StatusCode::NOT_FOUND,
            ApiError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
