use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("remote cache {0} timed out")]
    Timeout(&'static str),
    #[error("{0}")]
    Other(String),
}

/// Raw string get/set/delete against a remote key-value service.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// Bound on opening the first connection, retries included.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Bound on a single command round trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

async fn bounded<T, F>(limit: Duration, what: &'static str, fut: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, redis::RedisError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(BackendError::Timeout(what)),
    }
}

/// Redis-backed cache. The connection is opened on first use; the connection
/// manager reconnects by itself after transport failures.
///
/// The slot lock only guards the cached manager. Connecting happens outside
/// it, so a dead server costs each caller at most [`CONNECT_TIMEOUT`].
pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisBackend {
    pub fn open(url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        let cached = self.conn.lock().clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        // One retry: the availability tracker decides when to stop trying.
        let conn = bounded(
            CONNECT_TIMEOUT,
            "connect",
            ConnectionManager::new_with_backoff(self.client.clone(), 2, 100, 1),
        )
        .await?;
        info!("Connected to remote cache");

        let mut slot = self.conn.lock();
        Ok(slot.get_or_insert(conn).clone())
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection().await?;
        bounded(COMMAND_TIMEOUT, "get", conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        bounded(COMMAND_TIMEOUT, "set", conn.set::<_, _, ()>(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.connection().await?;
        bounded(COMMAND_TIMEOUT, "delete", conn.del::<_, ()>(key)).await
    }
}

/// In-process map, selected with a `memory://` cache url.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.items.write().remove(key);
        Ok(())
    }
}
