use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::availability::AvailabilityTracker;
use crate::cache::backend::{BackendError, KvBackend};
use crate::models::{namespaced_key, BaseKey};

#[derive(Debug, Error)]
pub enum KvError {
    /// The tracker reported the backend unavailable; no call was attempted.
    #[error("remote cache unavailable")]
    Unavailable,
    /// The call was attempted and the transport failed.
    #[error("remote cache request failed: {0}")]
    Backend(String),
}

/// Per-user session state held in the remote cache.
#[derive(Clone)]
pub struct KvSessionStore {
    backend: Arc<dyn KvBackend>,
    tracker: Arc<AvailabilityTracker>,
}

impl KvSessionStore {
    pub fn new(backend: Arc<dyn KvBackend>, tracker: Arc<AvailabilityTracker>) -> Self {
        Self { backend, tracker }
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    pub fn is_available(&self) -> bool {
        self.tracker.is_available()
    }

    pub async fn get(&self, user_id: Option<&str>, base: BaseKey) -> Result<Option<String>, KvError> {
        let key = self.guard(user_id, base)?;
        let result = self.backend.get(&key).await;
        self.observe(&key, "get", result)
    }

    pub async fn set(&self, user_id: Option<&str>, base: BaseKey, value: &str) -> Result<(), KvError> {
        let key = self.guard(user_id, base)?;
        let result = self.backend.set(&key, value).await;
        self.observe(&key, "set", result)
    }

    pub async fn delete(&self, user_id: Option<&str>, base: BaseKey) -> Result<(), KvError> {
        let key = self.guard(user_id, base)?;
        let result = self.backend.delete(&key).await;
        self.observe(&key, "delete", result)
    }

    fn guard(&self, user_id: Option<&str>, base: BaseKey) -> Result<String, KvError> {
        let key = namespaced_key(user_id, base);
        if !self.tracker.is_available() {
            warn!(key = %key, "Remote cache unavailable, skipping call");
            return Err(KvError::Unavailable);
        }
        Ok(key)
    }

    fn observe<T>(&self, key: &str, op: &str, result: Result<T, BackendError>) -> Result<T, KvError> {
        match result {
            Ok(value) => {
                debug!(key, op, "Remote cache call succeeded");
                self.tracker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.tracker.record_error(format!("{} {}: {}", op, key, e));
                Err(KvError::Backend(e.to_string()))
            }
        }
    }
}
