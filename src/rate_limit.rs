//! Per-user request gating before paid inference calls
//!
//! Counters are process-local. A multi-instance deployment should inject a
//! `RateLimiter` backed by a shared counter store instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// `true` when the request may proceed; counts the request.
    async fn check(&self, user: &str) -> bool;
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed window: at most `max` requests per `window` per user.
pub struct FixedWindowRateLimiter {
    max: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl FixedWindowRateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Same as `check` with an explicit clock reading.
    pub async fn check_at(&self, user: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;

        // Expired windows would be reset on next use anyway.
        if windows.len() > 4096 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(user.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max {
            debug!(count = entry.count, "Rate limit reached");
            return false;
        }

        entry.count += 1;
        true
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(60))
    }
}

#[async_trait::async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, user: &str) -> bool {
        self.check_at(user, Instant::now()).await
    }
}

/// Never limits. For consoles and tests.
pub struct UnlimitedRateLimiter;

#[async_trait::async_trait]
impl RateLimiter for UnlimitedRateLimiter {
    async fn check(&self, _user: &str) -> bool {
        true
    }
}
