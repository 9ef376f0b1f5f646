pub mod api;
pub mod cache;
pub mod local;
pub mod relational;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cache::{open_backend, AvailabilityTracker, KvError, KvSessionStore};
use crate::config::AppConfig;
use crate::db::{self, DbPool};
use crate::models::{ChatSession, StorageOptions, StorageType};

pub use api::ApiStorageService;
pub use cache::CacheStorageService;
pub use local::{LocalStorageService, LocalStore};
pub use relational::RelationalStorageService;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable")]
    Unavailable,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<KvError> for StorageError {
    fn from(_: KvError) -> Self {
        StorageError::Unavailable
    }
}

/// Chat session persistence, identical across backends.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get_chat_sessions(&self) -> Result<Vec<ChatSession>, StorageError>;
    async fn save_chat_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError>;
    async fn get_active_chat_id(&self) -> Result<String, StorageError>;
    async fn save_active_chat_id(&self, id: &str) -> Result<(), StorageError>;
    async fn get_selected_model(&self) -> Result<String, StorageError>;
    async fn save_selected_model(&self, model: &str) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
    async fn close(&self) -> Result<(), StorageError>;
}

/// Builds a per-request [`StorageService`] from [`StorageOptions`].
///
/// The factory owns the long-lived handles (local store, remote cache, DuckDB
/// connections) so building a service per request stays cheap.
pub struct StorageServiceFactory {
    local: LocalStore,
    cache: KvSessionStore,
    relational: Mutex<HashMap<String, DbPool>>,
}

impl StorageServiceFactory {
    pub fn new(local: LocalStore, cache: KvSessionStore) -> Self {
        Self {
            local,
            cache,
            relational: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        let local = match config.storage.local_path.as_deref() {
            Some(path) if !path.is_empty() => LocalStore::open(path)?,
            _ => LocalStore::in_memory(),
        };
        let backend = open_backend(&config.cache.url)
            .map_err(|e| StorageError::Config(format!("invalid cache url: {}", e)))?;
        let cache = KvSessionStore::new(backend, Arc::new(AvailabilityTracker::new()));
        Ok(Self::new(local, cache))
    }

    pub fn cache_store(&self) -> &KvSessionStore {
        &self.cache
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    pub fn create_service(&self, options: &StorageOptions) -> Arc<dyn StorageService> {
        debug!(
            storage_type = %options.storage_type,
            user_id = ?options.user_id,
            has_connection_url = options.connection_url.is_some(),
            "Creating storage service"
        );

        match options.storage_type {
            StorageType::Local => self.local_service(options),
            StorageType::Redis => Arc::new(CacheStorageService::new(
                self.cache.clone(),
                options.user_id.clone(),
            )),
            StorageType::Relational => {
                let Some(url) = options.connection_url.as_deref() else {
                    warn!(
                        storage_type = %options.storage_type,
                        "Relational storage requires a connection url, falling back to local storage"
                    );
                    return self.local_service(options);
                };

                let pool = match self.relational_pool(url) {
                    Ok(pool) => pool,
                    Err(e) => {
                        error!(error = %e, "Failed to open relational store, falling back to local storage");
                        return self.local_service(options);
                    }
                };

                match RelationalStorageService::new(pool, options.user_id.clone()) {
                    Ok(service) => Arc::new(service),
                    Err(e) => {
                        error!(error = %e, "Failed to create relational storage service, falling back to local storage");
                        self.local_service(options)
                    }
                }
            }
        }
    }

    fn local_service(&self, options: &StorageOptions) -> Arc<dyn StorageService> {
        Arc::new(LocalStorageService::new(
            self.local.clone(),
            options.user_id.clone(),
        ))
    }

    fn relational_pool(&self, url: &str) -> Result<DbPool, StorageError> {
        let mut pools = self.relational.lock();
        if let Some(pool) = pools.get(url) {
            return Ok(pool.clone());
        }
        let pool = db::get_connection(url)?;
        pools.insert(url.to_string(), pool.clone());
        Ok(pool)
    }
}
