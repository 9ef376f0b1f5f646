use serde::{Deserialize, Serialize};

use crate::models::ChatSession;

// --- /api/v1/storage bodies, shared by the routes and ApiStorageService ---

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionsPayload {
    #[serde(default)]
    pub chat_sessions: Option<Vec<ChatSession>>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChatPayload {
    #[serde(default)]
    pub active_chat_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SelectedModelPayload {
    #[serde(default)]
    pub selected_model: Option<String>,
}

// --- /api/storage (remote cache) bodies ---

#[derive(Debug, Deserialize)]
pub struct ActiveIdRequest {
    pub id: String,
}

/// `value` is either the serialized session list or the list itself.
#[derive(Debug, Deserialize)]
pub struct SessionsBlobRequest {
    pub value: serde_json::Value,
}

// --- tools ---

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchPageQuery {
    pub url: Option<String>,
}

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

impl SearchQuery {
    /// Falls back to the default when `limit` is absent or not a number.
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}
