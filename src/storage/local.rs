use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::models::{namespaced_key, BaseKey, ChatSession};
use crate::storage::{StorageError, StorageService};

#[derive(Debug, Default)]
struct Inner {
    items: RwLock<HashMap<String, String>>,
    path: Option<PathBuf>,
}

/// Process-local string store, optionally mirrored to a JSON file so it
/// survives restarts. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        info!(path = %path.display(), keys = items.len(), "Opened local store");

        Ok(Self {
            inner: Arc::new(Inner {
                items: RwLock::new(items),
                path: Some(path),
            }),
        })
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.inner.items.read().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.inner.items.write();
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.inner.items.write();
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.items.read().contains_key(key)
    }

    fn persist(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub struct LocalStorageService {
    store: LocalStore,
    user_id: Option<String>,
}

impl LocalStorageService {
    pub fn new(store: LocalStore, user_id: Option<String>) -> Self {
        Self { store, user_id }
    }

    fn key(&self, base: BaseKey) -> String {
        namespaced_key(self.user_id.as_deref(), base)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn get_chat_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        let key = self.key(BaseKey::ChatSessions);
        let Some(saved) = self.store.get_item(&key) else {
            debug!(key = %key, "No chat sessions found in storage");
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<ChatSession>>(&saved) {
            Ok(sessions) => {
                debug!(key = %key, count = sessions.len(), "Loaded chat sessions from storage");
                Ok(sessions)
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to parse chat sessions");
                Ok(Vec::new())
            }
        }
    }

    async fn save_chat_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        let key = self.key(BaseKey::ChatSessions);
        debug!(key = %key, count = sessions.len(), "Saving chat sessions to storage");
        self.store.set_item(&key, &serde_json::to_string(sessions)?)
    }

    async fn get_active_chat_id(&self) -> Result<String, StorageError> {
        let key = self.key(BaseKey::ActiveChatId);
        if let Some(saved) = self.store.get_item(&key).filter(|id| !id.is_empty()) {
            debug!(key = %key, id = %saved, "Found active chat ID in storage");
            return Ok(saved);
        }

        debug!(key = %key, "No active chat ID found, checking sessions");
        let sessions = self.get_chat_sessions().await?;
        match sessions.first() {
            Some(first) => {
                debug!(id = %first.id, "Setting first session as active");
                self.save_active_chat_id(&first.id).await?;
                Ok(first.id.clone())
            }
            None => Ok(String::new()),
        }
    }

    async fn save_active_chat_id(&self, id: &str) -> Result<(), StorageError> {
        let key = self.key(BaseKey::ActiveChatId);
        debug!(key = %key, id, "Saving active chat ID");
        self.store.set_item(&key, id)
    }

    async fn get_selected_model(&self) -> Result<String, StorageError> {
        Ok(self
            .store
            .get_item(&self.key(BaseKey::SelectedModel))
            .unwrap_or_default())
    }

    async fn save_selected_model(&self, model: &str) -> Result<(), StorageError> {
        let key = self.key(BaseKey::SelectedModel);
        debug!(key = %key, model, "Saving selected model");
        self.store.set_item(&key, model)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for base in BaseKey::ALL {
            self.store.remove_item(&self.key(base))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
