use async_trait::async_trait;
use tracing::debug;

use crate::cache::KvSessionStore;
use crate::models::{BaseKey, ChatSession};
use crate::storage::{StorageError, StorageService};

/// Storage over the remote cache. Fails with [`StorageError::Unavailable`]
/// whenever the availability tracker has tripped.
pub struct CacheStorageService {
    store: KvSessionStore,
    user_id: Option<String>,
}

impl CacheStorageService {
    pub fn new(store: KvSessionStore, user_id: Option<String>) -> Self {
        Self { store, user_id }
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[async_trait]
impl StorageService for CacheStorageService {
    async fn get_chat_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        match self.store.get(self.user(), BaseKey::ChatSessions).await? {
            Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn save_chat_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        debug!(user_id = ?self.user_id, count = sessions.len(), "Saving chat sessions to remote cache");
        let raw = serde_json::to_string(sessions)?;
        Ok(self.store.set(self.user(), BaseKey::ChatSessions, &raw).await?)
    }

    async fn get_active_chat_id(&self) -> Result<String, StorageError> {
        Ok(self
            .store
            .get(self.user(), BaseKey::ActiveChatId)
            .await?
            .unwrap_or_default())
    }

    async fn save_active_chat_id(&self, id: &str) -> Result<(), StorageError> {
        Ok(self.store.set(self.user(), BaseKey::ActiveChatId, id).await?)
    }

    async fn get_selected_model(&self) -> Result<String, StorageError> {
        Ok(self
            .store
            .get(self.user(), BaseKey::SelectedModel)
            .await?
            .unwrap_or_default())
    }

    async fn save_selected_model(&self, model: &str) -> Result<(), StorageError> {
        Ok(self.store.set(self.user(), BaseKey::SelectedModel, model).await?)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for base in BaseKey::ALL {
            self.store.delete(self.user(), base).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
