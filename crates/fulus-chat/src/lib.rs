//! Conversation memory, function-calling, insights cache/rate-limiter,
//! audit log, retention scheduler, and telemetry for the chat surface
//! (spec components C10-C15).

pub mod audit_log;
pub mod conversation;
pub mod error;
pub mod insights_cache;
pub mod llm;
pub mod memory_cache;
pub mod rate_limiter;
pub mod retention;
pub mod stats;
pub mod tools;

pub use error::ChatError;
pub use llm::{AdminChatOrchestrator, ChatOrchestrator, LlmProvider};
pub use retention::RetentionScheduler;
pub use stats::ChatTelemetry;
pub use tools::FunctionRegistry;
