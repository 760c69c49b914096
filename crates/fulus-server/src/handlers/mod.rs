pub mod chat;
pub mod sync;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Assembles every route this core exposes, mirroring the teacher's
/// `handlers::routes<A>()` shape but over a concrete [`AppState`] rather
/// than a generic facilitator.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/offline", post(sync::sync_offline))
        .route("/sync/validate", post(sync::sync_validate))
        .route("/sync/chain/{userId}", get(sync::get_chain_state))
        .route("/sync/conflicts/{userId}", get(sync::get_conflicts))
        .route("/sync/retry/{userId}", post(sync::retry_failed))
        .route("/chat", post(chat::chat))
        .route("/chat/admin", post(chat::chat_admin))
}
