pub mod availability;
pub mod backend;
pub mod store;

use std::sync::Arc;

pub use availability::AvailabilityTracker;
pub use backend::{BackendError, KvBackend, MemoryBackend, RedisBackend};
pub use store::{KvError, KvSessionStore};

/// Picks the backend from the cache url: `memory://` keeps everything in
/// process, anything else is handed to the redis client.
pub fn open_backend(url: &str) -> Result<Arc<dyn KvBackend>, BackendError> {
    if url.starts_with("memory:") {
        return Ok(Arc::new(MemoryBackend::new()));
    }
    Ok(Arc::new(RedisBackend::open(url)?))
}
