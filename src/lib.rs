//! VK API Client
//!
//! Asynchronous client for the VK social network API with:
//! - One generic entry point, [`VkClient::call`], for every remote method
//! - Loosely-typed parameters validated at encode time
//! - A per-client rate governor shared by concurrent callers
//! - Retry of rate-limit and transient network failures with backoff
//! - Captcha and validation remediation through a pluggable handler
//! - FOAF profile metadata decoding
//! - Observability (tracing, metrics, token redaction)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vk_client::{ParameterBag, VkClient, VkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create client from environment
//!     let client = vk_client::create_client_from_env()?;
//!
//!     let users = client
//!         .call("users.get", ParameterBag::new().with("user_ids", vec![1, 2]))
//!         .await?;
//!
//!     println!("Users: {}", users);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `rustls` (default) - TLS through rustls
//! - `native-tls` - TLS through the platform library

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Core modules
pub mod classify;
pub mod client;
pub mod config;
pub mod errors;
pub mod params;
pub mod transport;

// Profile metadata
pub mod foaf;

// Resilience
pub mod resilience;

// Observability
pub mod observability;

// Testing utilities
pub mod fixtures;
pub mod mocks;

// Tests
#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use classify::{ApiResponse, SuccessPayload};
pub use client::VkClient;
pub use config::{Credential, TokenKind, VkConfig, VkConfigBuilder};
pub use errors::{ErrorKind, RemoteError, VkError, VkResult};
pub use params::{ParamValue, ParameterBag};
pub use resilience::RemediationHandler;

/// Default base URL for VK API methods
pub const DEFAULT_BASE_URL: &str = "https://api.vk.com/method";

/// Default API version sent as `v`
pub const DEFAULT_API_VERSION: &str = "5.199";

/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default rate-limit retry budget
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry budget for transient network failures
pub const DEFAULT_MAX_NETWORK_RETRIES: u32 = 3;

/// Create a VK client with the given configuration
pub fn create_client(config: VkConfig) -> VkResult<VkClient> {
    VkClient::new(config)
}

/// Create a VK client from environment variables
///
/// Reads:
/// - `VK_TOKEN` - Access token (required)
/// - `VK_TOKEN_KIND` - `user`, `group`, or `service`
/// - `VK_APP_ID` - Application id
/// - `VK_API_VERSION` - API version, defaults to [`DEFAULT_API_VERSION`]
/// - `VK_LANG` - Response language
/// - `VK_BASE_URL` - Method endpoint
/// - `VK_TIMEOUT` - Per-request timeout in seconds
/// - `VK_MAX_RETRIES` - Rate-limit retry budget
/// - `VK_REQUESTS_PER_SECOND` - Governor rate
pub fn create_client_from_env() -> VkResult<VkClient> {
    let config = VkConfig::from_env()?;
    create_client(config)
}
