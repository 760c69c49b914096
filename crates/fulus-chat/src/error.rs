//! Closed error taxonomy for the chat/function-calling layer, mirroring
//! `fulus_sync`'s per-module error enums.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation not found for user {0}")]
    ConversationNotFound(String),

    #[error("tool {0:?} is not registered")]
    UnknownTool(String),

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidToolArgs { tool: &'static str, reason: String },

    #[error("write tool {0} requires an explicit user intent confirmation")]
    IntentNotConfirmed(&'static str),

    #[error("write tool {0} cannot run as part of a speculative plan")]
    SpeculativeWriteRefused(&'static str),

    #[error("upstream LLM error: {0}")]
    UpstreamLlm(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authorization refused: {0}")]
    Authz(String),

    #[error("offline sync collaborator error: {0}")]
    SyncCollaborator(String),

    #[error("conflict {0} not found")]
    ConflictNotFound(Uuid),
}
