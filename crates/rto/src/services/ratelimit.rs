//! Rate limiter trait and fixed-window in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    /// How long the actor should wait before retrying, when throttled.
    pub retry_after: Option<Duration>,
}

/// Trait for per-actor throttling with retry-after semantics.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_limit(&self, actor_key: &str) -> Result<RateDecision>;
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window in-memory rate limiter.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    max_per_window: u32,
    window: Duration,
    state: Arc<RwLock<HashMap<String, Window>>>,
}

impl InMemoryRateLimiter {
    /// Creates a limiter allowing `max_per_window` calls per `window`.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(60))
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_limit(&self, actor_key: &str) -> Result<RateDecision> {
        let mut state = self.state.write().unwrap();
        let now = Instant::now();

        let window = state.entry(actor_key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_per_window {
            window.count += 1;
            Ok(RateDecision {
                allowed: true,
                retry_after: None,
            })
        } else {
            let retry_after = self.window - now.duration_since(window.started);
            Ok(RateDecision {
                allowed: false,
                retry_after: Some(retry_after),
            })
        }
    }
}
