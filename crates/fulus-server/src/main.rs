//! Fulus core HTTP entrypoint: the offline transaction sync engine and the
//! AI chat/function-calling surface behind one Axum server.
//!
//! Endpoints:
//! - `POST /sync/offline` - submit a batch of offline transactions
//! - `POST /sync/validate` - dry-run validation, no mutation
//! - `GET /sync/chain/{userId}` - chain state snapshot
//! - `GET /sync/conflicts/{userId}` - unresolved conflicts, priority-sorted
//! - `POST /sync/retry/{userId}` - replay failed transactions
//! - `POST /chat` - user-facing conversational assistant with tool-calling
//! - `POST /chat/admin` - read-only business-insights assistant
//!
//! This server includes:
//! - OpenTelemetry tracing via `TraceLayer`
//! - CORS support for cross-origin clients
//! - A background retention loop (nonce sweep, message prune, conflict cleanup)
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `OTEL_*` variables enable tracing export

mod config;
mod error;
mod handlers;
mod state;
mod telemetry;

use axum::http::Method;
use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;
use crate::telemetry::Telemetry;

struct EchoLlmProvider;

#[async_trait::async_trait]
impl fulus_chat::LlmProvider for EchoLlmProvider {
    async fn complete(
        &self,
        request: fulus_chat::llm::LlmRequest,
    ) -> Result<fulus_chat::llm::LlmResponse, fulus_chat::llm::LlmProviderError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, fulus_types::conversation::MessageRole::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(fulus_chat::llm::LlmResponse {
            content: Some(format!("Received: {last_user}")),
            tool_call: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::new();

    let config = Config::load()?;
    let host = config.host();
    let port = config.port();

    // Placeholder LLM collaborator until a real provider (e.g. an OpenAI- or
    // Anthropic-compatible endpoint) is wired in via configuration.
    let llm: Arc<dyn fulus_chat::LlmProvider> = Arc::new(EchoLlmProvider);

    let state = AppState::build(config, llm, chrono::Utc::now());

    let retention_scheduler = state.retention_scheduler.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(86_400));
        loop {
            interval.tick().await;
            let report = retention_scheduler.run_all(chrono::Utc::now()).await;
            tracing::info!(?report, "retention scheduler tick completed");
        }
    });

    let app: Router = handlers::routes().with_state(state).layer(TraceLayer::new_for_http()).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(host, port);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        std::process::exit(1);
    });

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
