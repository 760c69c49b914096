//! C10: Conversation memory.
//!
//! Append-only per-user dialogue with one logical conversation active at a
//! time; older conversations are archived rather than deleted. Follows the
//! same `Arc<DashMap<..>>` handle shape as `fulus_sync`'s reference stores.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fulus_types::conversation::{estimate_tokens, Conversation, Message, MessageRole};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatError;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the user's active (non-archived) conversation, creating one
    /// if none exists.
    async fn active_conversation(&self, user_id: &str, now: DateTime<Utc>) -> Conversation;

    /// Appends a message to the user's active conversation, assigning the
    /// next dense `sequenceNumber` and updating conversation counters.
    async fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Message;

    /// The last `n` messages of the user's active conversation, in
    /// chronological order.
    async fn recent(&self, user_id: &str, n: usize) -> Vec<Message>;

    /// Deletes all messages for the user's active conversation and resets
    /// its counters; the conversation row itself is retained.
    async fn clear(&self, user_id: &str) -> Result<(), ChatError>;

    /// Deletes messages older than `cutoff` across all conversations and
    /// archives conversations whose `lastMessageAt < cutoff`. Returns
    /// `(messages_deleted, conversations_archived)`.
    async fn prune(&self, cutoff: DateTime<Utc>) -> (usize, usize);
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryConversationStore {
    /// One active conversation id per user.
    active: Arc<DashMap<String, Uuid>>,
    conversations: Arc<DashMap<Uuid, Conversation>>,
    messages: Arc<DashMap<Uuid, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn conversation_id_for(&self, user_id: &str, now: DateTime<Utc>) -> Uuid {
        if let Some(id) = self.active.get(user_id) {
            if let Some(conv) = self.conversations.get(&*id) {
                if !conv.archived {
                    return *id;
                }
            }
        }
        let conv = Conversation::new(user_id, now);
        let id = conv.id;
        self.conversations.insert(id, conv);
        self.messages.insert(id, Vec::new());
        self.active.insert(user_id.to_string(), id);
        id
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn active_conversation(&self, user_id: &str, now: DateTime<Utc>) -> Conversation {
        let id = self.conversation_id_for(user_id, now);
        self.conversations.get(&id).unwrap().clone()
    }

    async fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Message {
        let id = self.conversation_id_for(user_id, now);
        let tokens = estimate_tokens(content);
        let mut history = self.messages.get_mut(&id).unwrap();
        let sequence_number = history.len() as u32;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: id,
            role,
            content: content.to_string(),
            sequence_number,
            tokens,
            timestamp: now,
            metadata,
        };
        history.push(message.clone());
        drop(history);

        let mut conv = self.conversations.get_mut(&id).unwrap();
        conv.message_count += 1;
        conv.total_tokens += tokens as u64;
        conv.last_message_at = now;
        message
    }

    async fn recent(&self, user_id: &str, n: usize) -> Vec<Message> {
        let Some(id) = self.active.get(user_id).map(|r| *r) else {
            return Vec::new();
        };
        let Some(history) = self.messages.get(&id) else {
            return Vec::new();
        };
        let len = history.len();
        let start = len.saturating_sub(n);
        history[start..].to_vec()
    }

    async fn clear(&self, user_id: &str) -> Result<(), ChatError> {
        let id = self
            .active
            .get(user_id)
            .map(|r| *r)
            .ok_or_else(|| ChatError::ConversationNotFound(user_id.to_string()))?;
        if let Some(mut history) = self.messages.get_mut(&id) {
            history.clear();
        }
        if let Some(mut conv) = self.conversations.get_mut(&id) {
            conv.message_count = 0;
            conv.total_tokens = 0;
        }
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> (usize, usize) {
        let mut messages_deleted = 0usize;
        for mut entry in self.messages.iter_mut() {
            let before = entry.len();
            entry.retain(|m| m.timestamp >= cutoff);
            messages_deleted += before - entry.len();
        }
        let mut conversations_archived = 0usize;
        for mut entry in self.conversations.iter_mut() {
            if !entry.archived && entry.last_message_at < cutoff {
                entry.archived = true;
                conversations_archived += 1;
            }
        }
        (messages_deleted, conversations_archived)
    }
}

/// Default retention window for `chat.prune-after-days` (spec §6).
pub const DEFAULT_PRUNE_AFTER_DAYS: i64 = 30;

pub fn default_prune_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(DEFAULT_PRUNE_AFTER_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn append_assigns_dense_sequence_numbers() {
        let store = InMemoryConversationStore::new();
        let m0 = store.append("user-1", MessageRole::User, "hi", None, ts(0)).await;
        let m1 = store.append("user-1", MessageRole::Assistant, "hello", None, ts(1)).await;
        assert_eq!(m0.sequence_number, 0);
        assert_eq!(m1.sequence_number, 1);
    }

    #[tokio::test]
    async fn recent_returns_last_n_in_order() {
        let store = InMemoryConversationStore::new();
        for i in 0..5 {
            store.append("user-1", MessageRole::User, &format!("msg{i}"), None, ts(i)).await;
        }
        let recent = store.recent("user-1", 2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "msg3");
        assert_eq!(recent[1].content, "msg4");
    }

    #[tokio::test]
    async fn clear_resets_counters_but_keeps_conversation() {
        let store = InMemoryConversationStore::new();
        store.append("user-1", MessageRole::User, "hi", None, ts(0)).await;
        let before = store.active_conversation("user-1", ts(0)).await;
        store.clear("user-1").await.unwrap();
        let after = store.active_conversation("user-1", ts(0)).await;
        assert_eq!(before.id, after.id);
        assert_eq!(after.message_count, 0);
        assert_eq!(after.total_tokens, 0);
        assert!(store.recent("user-1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn prune_deletes_old_messages_and_archives_stale_conversations() {
        let store = InMemoryConversationStore::new();
        store.append("user-1", MessageRole::User, "old", None, ts(0)).await;
        store.append("user-1", MessageRole::User, "new", None, ts(1000)).await;
        let (deleted, archived) = store.prune(ts(500)).await;
        assert_eq!(deleted, 1);
        assert_eq!(archived, 0);
        let remaining = store.recent("user-1", 10).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "new");
    }

    #[tokio::test]
    async fn prune_archives_conversations_inactive_past_cutoff() {
        let store = InMemoryConversationStore::new();
        store.append("user-1", MessageRole::User, "hi", None, ts(0)).await;
        let (_, archived) = store.prune(ts(10)).await;
        assert_eq!(archived, 1);
        let conv = store.active_conversation("user-1", ts(20)).await;
        // A fresh conversation is created since the old one is archived.
        assert!(conv.id != Uuid::nil());
    }
}
