//! Integration tests using WireMock
//!
//! These tests run the client over the real reqwest transport against a
//! mock HTTP server, covering form encoding, envelope classification,
//! retries, timeouts, and FOAF decoding.

mod engine;
mod foaf;

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vk_client::{VkClient, VkConfigBuilder};
use wiremock::MockServer;

/// Installs a test log subscriber once; `RUST_LOG` controls verbosity
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper to start a mock server
pub async fn setup_mock_server() -> MockServer {
    init_tracing();
    MockServer::start().await
}

/// Builder pointing the method endpoint at the mock server
pub fn config_for(server: &MockServer) -> VkConfigBuilder {
    VkConfigBuilder::new()
        .token("test-token")
        .requests_per_second(1000.0)
        .initial_backoff(Duration::from_millis(10))
        .base_url(&format!("{}/method", server.uri()))
        .expect("mock server URI is valid")
}

/// Client over the reqwest transport
pub fn client_for(builder: VkConfigBuilder) -> VkClient {
    VkClient::new(builder.build().expect("valid config")).expect("client builds")
}
