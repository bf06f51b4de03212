//! Write-rate governor for the GitHub API.
//!
//! From GitHub's best practices for integrators: if you're making a large
//! number of POST, PATCH, PUT, or DELETE requests for a single user or
//! client ID, wait at least one second between each request. Every
//! destination call acquires a permit from this governor before executing.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default minimum spacing between destination calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Serializing gate enforcing a minimum spacing between calls.
///
/// Implemented as a mutex-protected "earliest next call time" rather than a
/// token bucket; the lock is held across the wait so concurrent callers are
/// released one spacing interval apart.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a governor with the given minimum spacing.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_call: Mutex::new(None),
        }
    }

    /// Blocks until a permit is available, then reserves the next slot.
    pub async fn acquire(&self) {
        let mut next_call = self.next_call.lock().await;
        if let Some(at) = *next_call {
            let now = Instant::now();
            if at > now {
                trace!(wait_ms = (at - now).as_millis() as u64, "Waiting for rate limit permit");
                tokio::time::sleep(at - now).await;
            }
        }
        *next_call = Some(Instant::now() + self.interval);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
