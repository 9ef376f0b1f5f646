use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown message role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Client fields this crate does not interpret, persisted as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            reasoning_content: None,
            model: None,
            tool_calls: None,
            tool_call_id: None,
            extra: Map::new(),
        }
    }
}

/// Completion usage as reported by the gateway. The timing fields are only
/// present for some providers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
}

/// Session creation time in whichever shape the writer used: browsers send
/// epoch milliseconds, the relational store returns RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Millis(i64),
    Iso(String),
}

impl CreatedAt {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            CreatedAt::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            CreatedAt::Iso(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(dt: DateTime<Utc>) -> Self {
        CreatedAt::Iso(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<CreatedAt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatSession {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Some(Utc::now().into()),
            token_usage: None,
            extra: Map::new(),
        }
    }

    /// Applies one streamed content delta.
    ///
    /// Appended messages are immutable except for the trailing assistant message
    /// of an in-progress stream; a delta arriving after a non-assistant message
    /// opens a new assistant message.
    pub fn append_stream_delta(&mut self, delta: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(delta),
            _ => self.messages.push(Message::new(Role::Assistant, delta)),
        }
    }

    /// Plain text transcript, one `[ROLE]: content` block per message.
    pub fn to_transcript(&self) -> String {
        let mut export = String::new();
        export.push_str(&format!("Session: {}\n", self.title));
        export.push_str(&format!("ID: {}\n", self.id));
        if let Some(created_at) = self.created_at.as_ref().and_then(CreatedAt::to_datetime) {
            export.push_str(&format!("Created At: {}\n", created_at.to_rfc3339()));
        }
        export.push_str("---\n");

        for m in &self.messages {
            export.push_str(&format!("[{}]: {}\n", m.role.as_str().to_uppercase(), m.content));
            export.push_str("---\n");
        }
        export
    }
}

/// Logical keys persisted per user by every storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKey {
    ActiveChatId,
    ChatSessions,
    SelectedModel,
}

impl BaseKey {
    pub const ALL: [BaseKey; 3] = [
        BaseKey::ChatSessions,
        BaseKey::ActiveChatId,
        BaseKey::SelectedModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseKey::ActiveChatId => "activeChatId",
            BaseKey::ChatSessions => "chatSessions",
            BaseKey::SelectedModel => "selectedModel",
        }
    }
}

/// `"{user_id}_{base}"` when a user id is present, otherwise the bare base key.
pub fn namespaced_key(user_id: Option<&str>, base: BaseKey) -> String {
    match user_id.filter(|id| !id.is_empty()) {
        Some(user_id) => format!("{}_{}", user_id, base.as_str()),
        None => base.as_str().to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    Local,
    Redis,
    Relational,
}

impl StorageType {
    /// Unknown names fall back to local storage.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "" => StorageType::Local,
            "redis" | "remote-cache" | "cache" => StorageType::Redis,
            "relational" | "postgres" | "duckdb" | "sql" => StorageType::Relational,
            other => {
                warn!(storage_type = other, "Unknown storage type, falling back to local storage");
                StorageType::Local
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Redis => "redis",
            StorageType::Relational => "relational",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub storage_type: StorageType,
    pub user_id: Option<String>,
    pub connection_url: Option<String>,
}
