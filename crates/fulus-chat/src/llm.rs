//! LLM provider contract and the chat orchestration loop (spec §4.9): for
//! the user surface, assemble `[system-prompt, recent-history,
//! user-message]`, call the model, run at most one tool call, feed the
//! result back, call the model again, persist the assistant message. For
//! the admin surface, the same loop runs behind the insights cache (C12)
//! and rate limiter (C12), with every turn audited (C13).

use crate::audit_log::AuditLogStore;
use crate::conversation::ConversationStore;
use crate::error::ChatError;
use crate::insights_cache::InsightsCache;
use crate::memory_cache::ConversationMemoryCache;
use crate::rate_limiter::RateLimiter;
use crate::stats::ChatTelemetry;
use crate::tools::{parse_tool_call, FunctionRegistry, ToolContext, ToolSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fulus_types::conversation::MessageRole;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 20;
const LLM_CALL_DEADLINE: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_call: Option<ToolCallRequest>,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmProviderError {
    /// Transient: timeout, connection reset, 5xx. Eligible for retry.
    #[error("llm infrastructure error: {0}")]
    Infra(String),
    /// Permanent: bad request, content policy refusal, auth failure. Not retried.
    #[error("llm rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmProviderError>;
}

/// Runs `provider.complete` under a 30-second deadline, retrying up to
/// [`MAX_RETRIES`] times with exponential backoff (1s/2s/4s, capped at 10s)
/// when the provider reports an infrastructure error. Non-infra errors
/// propagate immediately.
async fn call_with_retry(provider: &dyn LlmProvider, request: LlmRequest, telemetry: &ChatTelemetry) -> Result<LlmResponse, ChatError> {
    let mut attempt = 0u32;
    loop {
        telemetry.record_llm_call();
        let outcome = tokio::time::timeout(LLM_CALL_DEADLINE, provider.complete(request.clone())).await;
        match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(LlmProviderError::Rejected(reason))) => return Err(ChatError::UpstreamLlm(reason)),
            Ok(Err(LlmProviderError::Infra(reason))) => {
                if attempt >= MAX_RETRIES {
                    return Err(ChatError::UpstreamLlm(reason));
                }
            }
            Err(_elapsed) => {
                if attempt >= MAX_RETRIES {
                    return Err(ChatError::UpstreamLlm("llm call timed out after 30s".to_string()));
                }
            }
        }
        telemetry.record_llm_retry();
        let backoff_ms = (BACKOFF_BASE_MS * 2u64.pow(attempt)).min(BACKOFF_CAP_MS);
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        attempt += 1;
    }
}

#[derive(Debug, Clone)]
pub struct ChatTurnResult {
    pub response: String,
    pub message_count: u32,
}

/// Composes the conversation memory, function registry, and LLM provider
/// into the end-to-end chat loop. Holds a per-user append lock so two
/// concurrent turns for the same user can't interleave their message
/// sequence numbers (spec §5: "at most one conversation-append per userId
/// at a time").
pub struct ChatOrchestrator {
    conversation_store: Arc<dyn ConversationStore>,
    memory_cache: ConversationMemoryCache,
    registry: Arc<FunctionRegistry>,
    llm: Arc<dyn LlmProvider>,
    telemetry: Arc<ChatTelemetry>,
    append_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    system_prompt: String,
    max_history_messages: usize,
}

impl ChatOrchestrator {
    pub fn new(
        conversation_store: Arc<dyn ConversationStore>,
        memory_cache: ConversationMemoryCache,
        registry: Arc<FunctionRegistry>,
        llm: Arc<dyn LlmProvider>,
        telemetry: Arc<ChatTelemetry>,
        system_prompt: impl Into<String>,
        max_history_messages: usize,
    ) -> Self {
        ChatOrchestrator {
            conversation_store,
            memory_cache,
            registry,
            llm,
            telemetry,
            append_locks: DashMap::new(),
            system_prompt: system_prompt.into(),
            max_history_messages,
        }
    }

    fn lock_for(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        self.append_locks.entry(user_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `POST /chat`: a single user turn, at most one tool invocation deep.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn handle_user_turn(
        &self,
        user_id: &str,
        user_phone: &str,
        message: &str,
        use_memory: bool,
        now: DateTime<Utc>,
    ) -> Result<ChatTurnResult, ChatError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let history = if use_memory {
            self.conversation_store.recent(user_id, self.max_history_messages).await
        } else {
            Vec::new()
        };
        self.conversation_store.append(user_id, MessageRole::User, message, None, now).await;

        let mut messages = vec![LlmMessage { role: MessageRole::System, content: self.system_prompt.clone() }];
        messages.extend(history.iter().map(|m| LlmMessage { role: m.role, content: m.content.clone() }));
        messages.push(LlmMessage { role: MessageRole::User, content: message.to_string() });

        let tools = self.registry.specs();
        let first = call_with_retry(self.llm.as_ref(), LlmRequest { messages: messages.clone(), tools: tools.clone() }, &self.telemetry).await?;

        let final_response = if let Some(tool_call) = first.tool_call {
            self.telemetry.record_tool_call();
            let call = parse_tool_call(&tool_call.name, &tool_call.arguments)?;
            let ctx = ToolContext { user_id: user_id.to_string(), user_phone: user_phone.to_string(), speculative: false };
            let tool_result = self.registry.invoke(call, &ctx, now).await;
            let tool_content = match &tool_result {
                Ok(value) => value.to_string(),
                Err(err) => format!("error: {err}"),
            };
            messages.push(LlmMessage { role: MessageRole::Assistant, content: first.content.clone().unwrap_or_default() });
            messages.push(LlmMessage { role: MessageRole::Tool, content: tool_content });
            let second = call_with_retry(self.llm.as_ref(), LlmRequest { messages, tools }, &self.telemetry).await?;
            second.content.unwrap_or_default()
        } else {
            first.content.unwrap_or_default()
        };

        let assistant_message = self.conversation_store.append(user_id, MessageRole::Assistant, &final_response, None, now).await;
        let conversation = self.conversation_store.active_conversation(user_id, now).await;
        self.memory_cache.invalidate(user_id);
        self.memory_cache.put(user_id, conversation.clone(), now);

        Ok(ChatTurnResult { response: final_response, message_count: conversation.message_count })
    }
}

/// Behind `POST /chat/admin`: insights caching, rate limiting, and audit
/// logging wrapped around the same LLM loop, targeting business-insight
/// queries rather than user account actions. No write tools are exposed
/// here; the admin surface is read-only by construction (it never builds
/// a [`crate::tools::FunctionRegistry`] with write handlers wired to a real
/// ledger).
pub struct AdminChatOrchestrator {
    llm: Arc<dyn LlmProvider>,
    insights_cache: InsightsCache,
    rate_limiter: RateLimiter,
    audit_log: Arc<dyn AuditLogStore>,
    telemetry: Arc<ChatTelemetry>,
    system_prompt: String,
}

#[derive(Debug, Clone)]
pub struct AdminChatTurnResult {
    pub response: String,
    pub conversation_id: Uuid,
    pub cached: bool,
}

impl AdminChatOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        insights_cache: InsightsCache,
        rate_limiter: RateLimiter,
        audit_log: Arc<dyn AuditLogStore>,
        telemetry: Arc<ChatTelemetry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        AdminChatOrchestrator {
            llm,
            insights_cache,
            rate_limiter,
            audit_log,
            telemetry,
            system_prompt: system_prompt.into(),
        }
    }

    /// IP whitelist enforcement belongs to the HTTP boundary; this method
    /// assumes the caller already authorized `admin_id`/`ip_address` and
    /// only applies the rate limiter, cache, and audit log that are this
    /// core's responsibility.
    #[tracing::instrument(skip_all, fields(admin_id = %admin_id))]
    pub async fn handle_admin_turn(
        &self,
        admin_id: &str,
        message: &str,
        conversation_id: Option<Uuid>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AdminChatTurnResult, ChatError> {
        if let Err(reason) = self.rate_limiter.try_admit(admin_id, now) {
            self.telemetry.record_rate_limit_refusal();
            self.audit_log
                .record(admin_id, "chat_refused", Some(reason.message().to_string()), ip_address, user_agent, now)
                .await;
            return Err(ChatError::RateLimited(reason.message().to_string()));
        }

        let conversation_id = conversation_id.unwrap_or_else(Uuid::new_v4);

        if let Some(cached) = self.insights_cache.get(message, now) {
            self.telemetry.record_cache_hit();
            self.audit_log.record(admin_id, "chat", Some(message.to_string()), ip_address, user_agent, now).await;
            return Ok(AdminChatTurnResult {
                response: cached.as_str().unwrap_or_default().to_string(),
                conversation_id,
                cached: true,
            });
        }
        self.telemetry.record_cache_miss();

        let messages = vec![
            LlmMessage { role: MessageRole::System, content: self.system_prompt.clone() },
            LlmMessage { role: MessageRole::User, content: message.to_string() },
        ];
        let response = call_with_retry(self.llm.as_ref(), LlmRequest { messages, tools: Vec::new() }, &self.telemetry).await?;
        let text = response.content.unwrap_or_default();

        self.insights_cache.put(message, serde_json::Value::String(text.clone()), now);
        self.audit_log.record(admin_id, "chat", Some(message.to_string()), ip_address, user_agent, now).await;

        Ok(AdminChatTurnResult { response: text, conversation_id, cached: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::InMemoryConversationStore;
    use crate::tools::{
        BudgetAssistantProvider, InMemoryBudgetAssistant, InMemorySavingsCalculator, InMemoryStatementProvider,
        InMemoryTransactionHistory, SavingsCalculatorProvider, StatementProvider, TransactionHistoryProvider,
    };
    use crate::audit_log::InMemoryAuditLogStore;
    use crate::insights_cache::StatsEpoch;
    use fulus_sync::chain_state_store::InMemoryChainStateStore;
    use fulus_sync::conflict_store::InMemoryConflictStore;
    use fulus_sync::ledger::InMemoryLedger;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    struct ScriptedLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmProviderError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_number == 0 && request.messages.iter().any(|m| m.content.contains("balance")) {
                return Ok(LlmResponse {
                    content: None,
                    tool_call: Some(ToolCallRequest {
                        name: "offline-query".to_string(),
                        arguments: serde_json::json!({}),
                    }),
                });
            }
            Ok(LlmResponse { content: Some("done".to_string()), tool_call: None })
        }
    }

    fn build_registry() -> Arc<FunctionRegistry> {
        Arc::new(FunctionRegistry::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryChainStateStore::new()),
            Arc::new(InMemoryConflictStore::new()),
            Arc::new(InMemoryTransactionHistory::new()) as Arc<dyn TransactionHistoryProvider>,
            Arc::new(InMemoryStatementProvider::new()) as Arc<dyn StatementProvider>,
            Arc::new(InMemorySavingsCalculator::new()) as Arc<dyn SavingsCalculatorProvider>,
            Arc::new(InMemoryBudgetAssistant::new()) as Arc<dyn BudgetAssistantProvider>,
        ))
    }

    #[tokio::test]
    async fn user_turn_without_tool_call_persists_both_messages() {
        let orchestrator = ChatOrchestrator::new(
            Arc::new(InMemoryConversationStore::new()),
            ConversationMemoryCache::new(60),
            build_registry(),
            Arc::new(ScriptedLlm { calls: AtomicUsize::new(0) }),
            Arc::new(ChatTelemetry::new()),
            "you are a helpful assistant",
            DEFAULT_MAX_HISTORY_MESSAGES,
        );
        let result = orchestrator.handle_user_turn("user-1", "+2348000000001", "hello", true, ts(0)).await.unwrap();
        assert_eq!(result.response, "done");
        assert_eq!(result.message_count, 2);
    }

    #[tokio::test]
    async fn user_turn_with_tool_call_round_trips_through_the_registry() {
        let orchestrator = ChatOrchestrator::new(
            Arc::new(InMemoryConversationStore::new()),
            ConversationMemoryCache::new(60),
            build_registry(),
            Arc::new(ScriptedLlm { calls: AtomicUsize::new(0) }),
            Arc::new(ChatTelemetry::new()),
            "you are a helpful assistant",
            DEFAULT_MAX_HISTORY_MESSAGES,
        );
        let result = orchestrator.handle_user_turn("user-1", "+2348000000001", "what's my balance", true, ts(0)).await.unwrap();
        assert_eq!(result.response, "done");
    }

    #[tokio::test]
    async fn admin_turn_caches_non_immediate_queries() {
        let orchestrator = AdminChatOrchestrator::new(
            Arc::new(ScriptedLlm { calls: AtomicUsize::new(0) }),
            InsightsCache::new(Arc::new(StatsEpoch::new(ts(0)))),
            RateLimiter::new(30, 100),
            Arc::new(InMemoryAuditLogStore::new()),
            Arc::new(ChatTelemetry::new()),
            "you summarize platform insights",
        );
        let first = orchestrator.handle_admin_turn("admin-1", "monthly revenue growth", None, None, None, ts(0)).await.unwrap();
        assert!(!first.cached);
        let second = orchestrator.handle_admin_turn("admin-1", "monthly revenue growth", None, None, None, ts(1)).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.response, first.response);
    }

    #[tokio::test]
    async fn admin_turn_refuses_past_the_minute_window() {
        let orchestrator = AdminChatOrchestrator::new(
            Arc::new(ScriptedLlm { calls: AtomicUsize::new(0) }),
            InsightsCache::new(Arc::new(StatsEpoch::new(ts(0)))),
            RateLimiter::new(1, 100),
            Arc::new(InMemoryAuditLogStore::new()),
            Arc::new(ChatTelemetry::new()),
            "you summarize platform insights",
        );
        orchestrator.handle_admin_turn("admin-1", "what regions do we operate in", None, None, None, ts(0)).await.unwrap();
        let refused = orchestrator.handle_admin_turn("admin-1", "what regions do we operate in", None, None, None, ts(0)).await;
        assert!(matches!(refused, Err(ChatError::RateLimited(_))));
    }
}
