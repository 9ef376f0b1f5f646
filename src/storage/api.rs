use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::api::models::{ActiveChatPayload, ChatSessionsPayload, SelectedModelPayload};
use crate::models::ChatSession;
use crate::storage::{StorageError, StorageService};

const CHAT_SESSIONS: &str = "/api/v1/storage/chat-sessions";
const ACTIVE_CHAT: &str = "/api/v1/storage/active-chat";
const SELECTED_MODEL: &str = "/api/v1/storage/selected-model";

/// Client side of the `/api/v1/storage` routes.
///
/// Reads degrade to empty values on any failure so a flaky server never
/// breaks rendering; writes surface their failure so callers can detect a
/// lost persist.
pub struct ApiStorageService {
    client: Client,
    base_url: String,
    user_id: Option<String>,
}

impl ApiStorageService {
    pub fn new(base_url: impl Into<String>, user_id: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, user_id)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match self.user_id.as_deref() {
            Some(user_id) => builder.bearer_auth(user_id),
            None => builder,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, StorageError> {
        let response = self.request(Method::GET, path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), StorageError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for ApiStorageService {
    async fn get_chat_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        match self.fetch::<ChatSessionsPayload>(CHAT_SESSIONS).await {
            Ok(body) => Ok(body.chat_sessions.unwrap_or_default()),
            Err(e) => {
                error!(error = %e, user_id = ?self.user_id, "Failed to fetch chat sessions from API");
                Ok(Vec::new())
            }
        }
    }

    async fn save_chat_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        let body = ChatSessionsPayload {
            chat_sessions: Some(sessions.to_vec()),
        };
        self.post(CHAT_SESSIONS, &body).await.map_err(|e| {
            error!(
                error = %e,
                user_id = ?self.user_id,
                session_count = sessions.len(),
                "Failed to save chat sessions to API"
            );
            e
        })
    }

    async fn get_active_chat_id(&self) -> Result<String, StorageError> {
        match self.fetch::<ActiveChatPayload>(ACTIVE_CHAT).await {
            Ok(body) => Ok(body.active_chat_id.unwrap_or_default()),
            Err(e) => {
                error!(error = %e, user_id = ?self.user_id, "Failed to fetch active chat ID from API");
                Ok(String::new())
            }
        }
    }

    async fn save_active_chat_id(&self, id: &str) -> Result<(), StorageError> {
        let body = ActiveChatPayload {
            active_chat_id: Some(id.to_string()),
        };
        self.post(ACTIVE_CHAT, &body).await.map_err(|e| {
            error!(error = %e, user_id = ?self.user_id, active_chat_id = id, "Failed to save active chat ID to API");
            e
        })
    }

    async fn get_selected_model(&self) -> Result<String, StorageError> {
        match self.fetch::<SelectedModelPayload>(SELECTED_MODEL).await {
            Ok(body) => Ok(body.selected_model.unwrap_or_default()),
            Err(e) => {
                error!(error = %e, user_id = ?self.user_id, "Failed to fetch selected model from API");
                Ok(String::new())
            }
        }
    }

    async fn save_selected_model(&self, model: &str) -> Result<(), StorageError> {
        let body = SelectedModelPayload {
            selected_model: Some(model.to_string()),
        };
        self.post(SELECTED_MODEL, &body).await.map_err(|e| {
            error!(error = %e, user_id = ?self.user_id, selected_model = model, "Failed to save selected model to API");
            e
        })
    }

    /// Three independent writes issued together. Every write runs to
    /// completion; the first failure is reported. Not atomic: a partial
    /// failure leaves whatever succeeded in place.
    async fn clear(&self) -> Result<(), StorageError> {
        let (sessions, active, model) = futures_util::join!(
            self.save_chat_sessions(&[]),
            self.save_active_chat_id(""),
            self.save_selected_model("")
        );
        sessions.and(active).and(model).map_err(|e| {
            error!(error = %e, user_id = ?self.user_id, "Failed to clear storage via API");
            e
        })
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
