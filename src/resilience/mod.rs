//! Resilience for API calls.
//!
//! Provides the rate governor, retry budgets, and the per-call retry
//! state machine with captcha and validation remediation.

pub mod orchestrator;
pub mod rate_limiter;
pub mod remediation;
pub mod retry;

pub use orchestrator::{CallAttempt, CallState, RetryOrchestrator};
pub use rate_limiter::{RateGovernor, RateLimiter, RateLimiterConfig};
pub use remediation::RemediationHandler;
pub use retry::RetryConfig;
