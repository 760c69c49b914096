//! Conversation memory data model (C10) shared by the user and admin chat
//! surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub message_count: u32,
    pub total_tokens: u64,
    pub last_message_at: DateTime<Utc>,
    pub archived: bool,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            message_count: 0,
            total_tokens: 0,
            last_message_at: now,
            archived: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub sequence_number: u32,
    pub tokens: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Estimates token count for a piece of text as `ceil(len / 4)`, a cheap
/// stand-in for a real tokenizer call.
pub fn estimate_tokens(content: &str) -> u32 {
    let len = content.len() as u32;
    len.div_ceil(4).max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConversation {
    pub id: Uuid,
    pub admin_id: String,
    pub summary: Option<String>,
    pub message_count: u32,
    pub total_tokens: u64,
    pub last_message_at: DateTime<Utc>,
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub sequence_number: u32,
    pub tokens: u32,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub admin_id: String,
    pub action: String,
    pub detail: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }
}
