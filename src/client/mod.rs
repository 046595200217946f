//! VK client implementation.
//!
//! [`VkClient::call`] is the single entry point for every remote method:
//! it injects the credential defaults, runs the retry orchestrator over the
//! rate governor and transport, and returns the decoded payload.

use crate::classify::{classify, ApiResponse, SuccessPayload};
use crate::config::{Credential, VkConfig};
use crate::errors::{ConfigurationError, VkError, VkResult};
use crate::foaf::FoafClient;
use crate::observability::{format_params, record_error, record_success, MetricsCollector, RequestTrace};
use crate::params::ParameterBag;
use crate::resilience::{
    RateLimiter, RateLimiterConfig, RemediationHandler, RetryConfig, RetryOrchestrator,
};
use crate::transport::{FormRequest, HttpTransport, RequestSigner, ReqwestTransport};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

/// Client for the VK API.
///
/// Cloning is cheap; clones share the rate governor, metrics, and the
/// credential slot.
#[derive(Clone)]
pub struct VkClient {
    config: Arc<VkConfig>,
    credential: Arc<RwLock<Arc<Credential>>>,
    transport: Arc<dyn HttpTransport>,
    governor: Arc<RateLimiter>,
    signer: Option<Arc<dyn RequestSigner>>,
    orchestrator: Arc<RetryOrchestrator>,
    metrics: Arc<MetricsCollector>,
}

impl VkClient {
    /// Create a new client with the given configuration
    pub fn new(config: VkConfig) -> VkResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Self::with_transport(config, transport)
    }

    /// Create a new client with a custom transport
    pub fn with_transport(config: VkConfig, transport: Arc<dyn HttpTransport>) -> VkResult<Self> {
        config.validate()?;

        let credential = config
            .credential()
            .cloned()
            .ok_or(VkError::Configuration(ConfigurationError::MissingToken))?;

        let governor = RateLimiter::with_config(
            RateLimiterConfig::new()
                .max_tokens(config.burst)
                .refill_rate(config.requests_per_second),
        );
        let metrics = Arc::new(MetricsCollector::new());
        let orchestrator = RetryOrchestrator::new(RetryConfig::from_config(&config))
            .with_metrics(metrics.clone());

        Ok(Self {
            config: Arc::new(config),
            credential: Arc::new(RwLock::new(Arc::new(credential))),
            transport,
            governor: Arc::new(governor),
            signer: None,
            orchestrator: Arc::new(orchestrator),
            metrics,
        })
    }

    /// Sign every request with `signer`
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Resolve captcha and validation challenges with `handler`
    pub fn with_remediation_handler(mut self, handler: Arc<dyn RemediationHandler>) -> Self {
        let orchestrator = RetryOrchestrator::new(RetryConfig::from_config(&self.config))
            .with_metrics(self.metrics.clone())
            .with_handler(handler);
        self.orchestrator = Arc::new(orchestrator);
        self
    }

    /// Whether captcha and validation challenges are resolved in-call
    pub fn has_remediation_handler(&self) -> bool {
        self.orchestrator.has_handler()
    }

    /// Get the configuration
    pub fn config(&self) -> &VkConfig {
        &self.config
    }

    /// Credential used by calls started from now on
    pub fn credential(&self) -> Arc<Credential> {
        self.credential.read().clone()
    }

    /// Replace the credential; calls already in flight keep the old one
    pub fn set_credential(&self, credential: Credential) -> VkResult<()> {
        credential.validate()?;
        *self.credential.write() = Arc::new(credential);
        debug!("Credential replaced");
        Ok(())
    }

    /// Call metrics
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// The shared rate governor
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.governor
    }

    /// FOAF fetcher over the same transport
    pub fn foaf(&self) -> FoafClient {
        FoafClient::new(self.transport.clone()).with_timeout(self.config.timeout)
    }

    /// Invoke `method` and return its `response` payload
    pub async fn call(&self, method: &str, params: ParameterBag) -> VkResult<Value> {
        Ok(self.call_full(method, params).await?.response)
    }

    /// Invoke `method`, failing with [`VkError::Timeout`] once `deadline`
    /// has elapsed
    pub async fn call_with_deadline(
        &self,
        method: &str,
        params: ParameterBag,
        deadline: Duration,
    ) -> VkResult<Value> {
        Ok(self.execute(method, params, Some(deadline)).await?.response)
    }

    /// Invoke `method` and decode the payload into `T`
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: ParameterBag,
    ) -> VkResult<T> {
        self.call_full(method, params).await?.decode()
    }

    /// Invoke `method` and return the payload with any `execute` errors
    pub async fn call_full(&self, method: &str, params: ParameterBag) -> VkResult<SuccessPayload> {
        self.execute(method, params, self.config.call_deadline).await
    }

    async fn execute(
        &self,
        method: &str,
        params: ParameterBag,
        deadline: Option<Duration>,
    ) -> VkResult<SuccessPayload> {
        let trace = RequestTrace::new(method);
        let span = trace.span();
        let active = self.metrics.record_call_start(method);

        let run = self.run(method, params).instrument(span.clone());
        let result = match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(VkError::Timeout {
                    elapsed: trace.elapsed(),
                }),
            },
            None => run.await,
        };

        match &result {
            Ok(_) => record_success(&span),
            Err(e) => record_error(&span, &e.to_string()),
        }
        active.finish(trace.elapsed_ms(), result.is_ok());

        result
    }

    async fn run(&self, method: &str, mut params: ParameterBag) -> VkResult<SuccessPayload> {
        if method.trim().is_empty() {
            return Err(VkError::InvalidParameter {
                key: "method".to_string(),
                reason: "method name is empty".to_string(),
            });
        }

        let credential = self.credential();
        params.merge(&defaults(&credential));
        // Reject unencodable values before anything is sent
        params.encode()?;

        let url = self.config.build_url(method);
        self.orchestrator
            .run(method, params, |attempt| self.attempt(method, &url, attempt))
            .await
    }

    /// One dispatch: encode, sign, wait for a rate slot, send, classify
    async fn attempt(&self, method: &str, url: &str, params: ParameterBag) -> VkResult<ApiResponse> {
        let mut fields = params.encode()?;
        if let Some(signer) = &self.signer {
            signer.sign(method, &mut fields)?;
        }

        let waited = self.governor.acquire().await;
        self.metrics.record_rate_wait(waited);

        debug!(method, params = %format_params(&fields), "Dispatching call");

        let request = FormRequest::post(url, self.config.default_headers.clone())
            .fields(fields)
            .with_timeout(self.config.timeout);
        let body = self.transport.send_form(request).await?;

        classify(&body)
    }
}

/// Parameters every call carries unless the caller sets them
fn defaults(credential: &Credential) -> ParameterBag {
    let mut bag = ParameterBag::new();
    bag.set("access_token", credential.expose())
        .set("v", credential.api_version());
    if let Some(lang) = credential.lang() {
        bag.set("lang", lang);
    }
    bag
}

impl std::fmt::Debug for VkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VkClient")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .field("has_handler", &self.orchestrator.has_handler())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VkConfigBuilder;
    use crate::mocks::{MockHttpTransport, MockResponse};
    use crate::params::ParamValue;

    fn client(transport: Arc<MockHttpTransport>) -> VkClient {
        let config = VkConfigBuilder::new()
            .token("test-token")
            .requests_per_second(1000.0)
            .build()
            .unwrap();
        VkClient::with_transport(config, transport).unwrap()
    }

    #[test]
    fn test_client_requires_token() {
        let config = VkConfigBuilder::new().build_unchecked();
        let result = VkClient::with_transport(config, MockHttpTransport::new().shared());
        assert!(matches!(result, Err(VkError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_defaults_are_injected() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::success("[]"))
            .shared();
        let client = client(transport.clone());

        client
            .call("users.get", ParameterBag::new().with("user_ids", 1))
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://api.vk.com/method/users.get");
        assert_eq!(request.field("access_token"), Some("test-token"));
        assert_eq!(request.field("v"), Some(crate::DEFAULT_API_VERSION));
        assert_eq!(request.field("user_ids"), Some("1"));
        assert_eq!(request.field("lang"), None);
    }

    #[tokio::test]
    async fn test_caller_parameters_win_over_defaults() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::success("[]"))
            .shared();
        let client = client(transport.clone());

        client
            .call("users.get", ParameterBag::new().with("v", "5.131"))
            .await
            .unwrap();

        assert_eq!(transport.last_request().unwrap().field("v"), Some("5.131"));
    }

    #[tokio::test]
    async fn test_unencodable_parameter_is_not_sent() {
        let transport = MockHttpTransport::new().shared();
        let client = client(transport.clone());

        let nested = ParamValue::List(vec![ParamValue::List(vec![ParamValue::Int(1)])]);
        let err = client
            .call("users.get", ParameterBag::new().with("user_ids", nested))
            .await
            .unwrap_err();

        assert!(matches!(err, VkError::InvalidParameter { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_method_is_rejected() {
        let client = client(MockHttpTransport::new().shared());
        assert!(matches!(
            client.call("", ParameterBag::new()).await,
            Err(VkError::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_metrics_track_calls() {
        let transport = MockHttpTransport::new()
            .add_responses([MockResponse::success("1"), MockResponse::api_error(7, "Permission denied")])
            .shared();
        let client = client(transport);

        client.call("wall.post", ParameterBag::new()).await.unwrap();
        client.call("wall.post", ParameterBag::new()).await.unwrap_err();

        assert_eq!(client.metrics().call_count("wall.post"), 2);
        assert_eq!(client.metrics().error_count("wall.post"), 1);
        assert_eq!(client.metrics().active_calls(), 0);
    }

    #[test]
    fn test_debug_hides_token() {
        let client = client(MockHttpTransport::new().shared());
        assert!(!format!("{:?}", client).contains("test-token"));
    }
}
