//! Retry budgets and exponential backoff.

use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Consecutive rate-limit errors after which the call fails
    pub max_retries: u32,
    /// Immediate retries allowed for transient network failures
    pub max_network_retries: u32,
    /// Remediation rounds allowed per call
    pub max_remediations: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            max_network_retries: crate::DEFAULT_MAX_NETWORK_RETRIES,
            max_remediations: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from client configuration
    pub fn from_config(config: &crate::config::VkConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_network_retries: config.max_network_retries,
            max_remediations: config.max_remediations,
            initial_delay: config.initial_backoff,
            max_delay: config.backoff_ceiling,
            ..Self::default()
        }
    }

    /// Set maximum retries
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set maximum network retries
    pub fn max_network_retries(mut self, n: u32) -> Self {
        self.max_network_retries = n;
        self
    }

    /// Set maximum remediation rounds
    pub fn max_remediations(mut self, n: u32) -> Self {
        self.max_remediations = n;
        self
    }

    /// Set initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn multiplier(mut self, m: f64) -> Self {
        self.multiplier = m;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Calculate delay for a given attempt number (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let max_delay = self.max_delay.as_millis() as f64;
        let capped_delay = base_delay.min(max_delay);

        let final_delay = if self.with_jitter {
            // Between 0.5 and 1.5 of the delay, still capped
            let jitter_factor = 0.5 + rand_jitter();
            (capped_delay * jitter_factor).min(max_delay)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0)
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % 100) as f64 / 100.0
}
