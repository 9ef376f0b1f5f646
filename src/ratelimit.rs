//! Fixed-window request limiter keyed by client address.
//!
//! Each key gets a counter and a window end. A request arriving after the
//! window end starts a new window; rejections never move the window, so a
//! client is locked out for at most one window. Bursts straddling a window
//! boundary can admit up to twice `max_requests`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub type KeyGenerator = Arc<dyn Fn(&HeaderMap) -> String + Send + Sync>;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_REQUESTS: u32 = 60;

#[derive(Clone)]
pub struct RateLimiterConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub key_generator: Option<KeyGenerator>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
            key_generator: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_time: DateTime<Utc>,
}

pub struct RateLimiter {
    window: chrono::Duration,
    max_requests: u32,
    key_generator: KeyGenerator,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let window = chrono::Duration::from_std(config.window)
            .unwrap_or_else(|_| chrono::Duration::milliseconds(DEFAULT_WINDOW.as_millis() as i64));
        Self {
            window,
            max_requests: config.max_requests,
            key_generator: config
                .key_generator
                .unwrap_or_else(|| Arc::new(default_key) as KeyGenerator),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check_limit(&self, headers: &HeaderMap) -> RateLimitResult {
        let key = (self.key_generator)(headers);
        self.check_limit_at(&key, Utc::now())
    }

    pub fn check_limit_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitResult {
        let mut entries = self.entries.lock();

        // Amortized sweep; this also drops the caller's own expired window.
        entries.retain(|_, entry| now < entry.reset_time);

        match entries.get_mut(key) {
            Some(entry) if entry.count >= self.max_requests => RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_time: entry.reset_time,
            },
            Some(entry) => {
                entry.count += 1;
                RateLimitResult {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(entry.count),
                    reset_time: entry.reset_time,
                }
            }
            None => {
                let reset_time = now + self.window;
                entries.insert(
                    key.to_string(),
                    Entry {
                        count: 1,
                        reset_time,
                    },
                );
                RateLimitResult {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_time,
                }
            }
        }
    }

    /// Number of live windows; expired ones are only dropped on the next check.
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }
}

/// `x-forwarded-for`, then `x-real-ip`, then `"unknown"`.
pub fn default_key(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
