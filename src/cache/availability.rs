use std::fmt::Display;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Consecutive errors before the remote cache is reported unavailable.
pub const MAX_ERRORS: u32 = 5;
/// How long the cache stays unavailable once the threshold is hit.
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

#[derive(Debug)]
struct State {
    error_count: u32,
    available: bool,
    retry_at: Option<Instant>,
}

/// Advisory gate consulted before every remote cache operation.
///
/// Shared by all request handlers; every transition happens under one lock so
/// the threshold and cooldown arithmetic hold across worker threads.
#[derive(Debug)]
pub struct AvailabilityTracker {
    state: Mutex<State>,
    max_errors: u32,
    retry_delay: Duration,
}

impl Default for AvailabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::with_limits(MAX_ERRORS, RETRY_DELAY)
    }

    pub fn with_limits(max_errors: u32, retry_delay: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                error_count: 0,
                available: true,
                retry_at: None,
            }),
            max_errors,
            retry_delay,
        }
    }

    pub fn record_error(&self, err: impl Display) {
        error!(error = %err, "Remote cache error");

        let now = Instant::now();
        let mut state = self.state.lock();
        Self::expire(&mut state, now);

        state.error_count += 1;
        if state.error_count >= self.max_errors {
            if state.available {
                warn!(
                    error_count = state.error_count,
                    retry_after_ms = self.retry_delay.as_millis() as u64,
                    "Remote cache marked unavailable"
                );
            }
            state.available = false;
            // The first armed deadline wins; later errors never extend it.
            if state.retry_at.is_none() {
                state.retry_at = Some(now + self.retry_delay);
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if !state.available {
            info!("Remote cache available again");
        }
        state.error_count = 0;
        state.available = true;
        state.retry_at = None;
    }

    pub fn is_available(&self) -> bool {
        let mut state = self.state.lock();
        Self::expire(&mut state, Instant::now());
        state.available
    }

    pub fn error_count(&self) -> u32 {
        let mut state = self.state.lock();
        Self::expire(&mut state, Instant::now());
        state.error_count
    }

    fn expire(state: &mut State, now: Instant) {
        if let Some(retry_at) = state.retry_at {
            if now >= retry_at {
                state.available = true;
                state.error_count = 0;
                state.retry_at = None;
            }
        }
    }
}
