//! Rate governor using a reserving token bucket.
//!
//! Every caller reserves a token under the lock, even when the bucket is
//! empty, and then sleeps until its reservation matures. Reservations are
//! handed out in lock order, so each waiter proceeds after a bounded delay.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for the rate governor
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens (requests) in the bucket
    pub max_tokens: u32,
    /// Tokens refilled per second
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1,
            refill_rate: 3.0,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum tokens
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n.max(1);
        self
    }

    /// Set refill rate (tokens per second)
    pub fn refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = rate;
        self
    }

    /// Ceiling for user tokens (3 requests per second)
    pub fn user() -> Self {
        Self::new().refill_rate(3.0)
    }

    /// Ceiling for community tokens (20 requests per second)
    pub fn group() -> Self {
        Self::new().refill_rate(20.0)
    }

    /// Ceiling for service tokens (3 requests per second)
    pub fn service() -> Self {
        Self::new().refill_rate(3.0)
    }
}

/// Token bucket state; the balance goes negative while reservations wait
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    config: RateLimiterConfig,
}

impl TokenBucket {
    fn new(config: RateLimiterConfig) -> Self {
        Self {
            tokens: config.max_tokens as f64,
            last_refill: Instant::now(),
            config,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let new_tokens = elapsed * self.config.refill_rate;
        self.tokens = (self.tokens + new_tokens).min(self.config.max_tokens as f64);
        self.last_refill = now;
    }

    /// Take one token and return how long the caller must wait for it
    fn reserve(&mut self) -> Duration {
        self.refill();
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            // Tiny rates overflow Duration; saturate instead
            Duration::try_from_secs_f64(-self.tokens / self.config.refill_rate)
                .unwrap_or(Duration::MAX)
        }
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client rate governor shared by all concurrent calls
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a new governor with default configuration
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    /// Create a new governor with custom configuration
    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.clone())),
            config,
        }
    }

    /// Wait for a call slot and return how long the caller waited.
    /// Never fails.
    ///
    /// The slot is consumed when the reservation is made, so a caller
    /// dropped while sleeping still counts against the budget.
    pub async fn acquire(&self) -> Duration {
        let wait = self.bucket.lock().reserve();

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate slot");
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_take()
    }

    /// Tokens currently available (negative while reservations are pending)
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens
    }

    /// The configuration in use
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Refill the bucket completely
    pub fn reset(&self) {
        let mut bucket = self.bucket.lock();
        bucket.tokens = bucket.config.max_tokens as f64;
        bucket.last_refill = Instant::now();
        debug!("Rate governor reset");
    }
}

/// Name used for the per-client throttle
pub type RateGovernor = RateLimiter;

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("available", &self.available())
            .finish()
    }
}
