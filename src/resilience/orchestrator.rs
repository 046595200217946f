//! Per-call retry state machine.
//!
//! Drives one call through `Pending → Attempting → {Succeeded, Retrying,
//! AwaitingRemediation, Failed}` given the classification of each attempt.

use super::{RemediationHandler, RetryConfig};
use crate::classify::{ApiResponse, SuccessPayload};
use crate::errors::{ErrorKind, RemoteError, VkError, VkResult};
use crate::observability::MetricsCollector;
use crate::params::ParameterBag;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// State of a call in the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Not dispatched yet
    Pending,
    /// Request in flight
    Attempting,
    /// Waiting before the next attempt
    Retrying,
    /// Waiting for the remediation handler
    AwaitingRemediation,
    /// Terminal success
    Succeeded,
    /// Terminal failure
    Failed,
}

impl CallState {
    /// Whether the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded | CallState::Failed)
    }
}

/// Book-keeping for one in-flight call
#[derive(Debug, Clone)]
pub struct CallAttempt {
    /// Remote method name
    pub method: String,
    /// Parameters sent on the next attempt
    pub params: ParameterBag,
    /// Attempts dispatched so far
    pub attempts: u32,
    /// Consecutive rate-limit classifications
    pub rate_limited: u32,
    /// Network retries used
    pub network_retries: u32,
    /// Remediation rounds used
    pub remediations: u32,
    /// Total time spent in backoff
    pub backoff: Duration,
    /// Kind of the last remote error seen
    pub last_kind: Option<ErrorKind>,
    /// Current state
    pub state: CallState,
}

impl CallAttempt {
    /// Start a new call
    pub fn new(method: impl Into<String>, params: ParameterBag) -> Self {
        Self {
            method: method.into(),
            params,
            attempts: 0,
            rate_limited: 0,
            network_retries: 0,
            remediations: 0,
            backoff: Duration::ZERO,
            last_kind: None,
            state: CallState::Pending,
        }
    }

    fn transition(&mut self, next: CallState) {
        trace!(method = %self.method, from = ?self.state, to = ?next, "Call state change");
        self.state = next;
    }
}

/// Runs the retry state machine for individual calls
pub struct RetryOrchestrator {
    config: RetryConfig,
    handler: Option<Arc<dyn RemediationHandler>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RetryOrchestrator {
    /// Create an orchestrator without a remediation handler
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            handler: None,
            metrics: None,
        }
    }

    /// Register a remediation handler
    pub fn with_handler(mut self, handler: Arc<dyn RemediationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Report retries and remediations to a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether a remediation handler is registered
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Run a call to completion.
    ///
    /// `dispatch` performs one attempt with the given parameters and returns
    /// the classified response.
    pub async fn run<F, Fut>(
        &self,
        method: &str,
        params: ParameterBag,
        dispatch: F,
    ) -> VkResult<SuccessPayload>
    where
        F: Fn(ParameterBag) -> Fut,
        Fut: Future<Output = VkResult<ApiResponse>>,
    {
        let mut call = CallAttempt::new(method, params);

        loop {
            call.transition(CallState::Attempting);
            call.attempts += 1;

            let error = match dispatch(call.params.clone()).await {
                Ok(ApiResponse::Success(payload)) => {
                    call.transition(CallState::Succeeded);
                    if call.attempts > 1 {
                        debug!(method, attempts = call.attempts, "Call succeeded after retry");
                    }
                    return Ok(payload);
                }
                Ok(ApiResponse::Failure(remote)) => {
                    call.last_kind = Some(remote.kind);
                    match remote.kind {
                        ErrorKind::TooManyRequests => {
                            call.rate_limited += 1;
                            if call.rate_limited >= self.config.max_retries {
                                VkError::Remote(remote)
                            } else {
                                let delay = self.config.delay_for_attempt(call.rate_limited);
                                self.backoff(&mut call, delay, &remote).await;
                                continue;
                            }
                        }
                        ErrorKind::CaptchaRequired | ErrorKind::ValidationRequired => {
                            call.rate_limited = 0;
                            match self.remediate(&mut call, remote).await {
                                Ok(()) => continue,
                                Err(error) => error,
                            }
                        }
                        _ => VkError::Remote(remote),
                    }
                }
                Err(VkError::Network(network)) if network.is_transient() => {
                    call.rate_limited = 0;
                    if call.network_retries < self.config.max_network_retries {
                        call.network_retries += 1;
                        call.transition(CallState::Retrying);
                        self.record_retry(method);
                        debug!(
                            method,
                            attempt = call.attempts,
                            error = %network,
                            "Retrying after transient network error"
                        );
                        continue;
                    }
                    VkError::Network(network)
                }
                Err(error) => error,
            };

            call.transition(CallState::Failed);
            warn!(
                method,
                attempts = call.attempts,
                error = %error,
                "Call failed permanently"
            );
            return Err(error);
        }
    }

    async fn backoff(&self, call: &mut CallAttempt, delay: Duration, remote: &RemoteError) {
        call.transition(CallState::Retrying);
        self.record_retry(&call.method);
        debug!(
            method = %call.method,
            attempt = call.attempts,
            delay_ms = delay.as_millis() as u64,
            code = remote.code,
            "Rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
        call.backoff += delay;
    }

    /// Resolve a captcha or validation challenge and augment the parameters
    async fn remediate(&self, call: &mut CallAttempt, remote: RemoteError) -> VkResult<()> {
        let Some(handler) = self.handler.as_ref() else {
            return Err(VkError::Remote(remote));
        };

        if call.remediations >= self.config.max_remediations {
            return Err(VkError::Remote(remote));
        }

        call.remediations += 1;
        call.transition(CallState::AwaitingRemediation);
        if let Some(metrics) = &self.metrics {
            metrics.record_remediation(&call.method);
        }

        let mut extra = ParameterBag::new();

        if let Some(captcha) = remote.captcha.as_ref() {
            debug!(method = %call.method, sid = %captcha.session_id, "Resolving captcha");
            let answer = handler
                .resolve_captcha(&captcha.image_url, &captcha.session_id)
                .await;
            let answer = remediation_result(answer, &remote)?;
            extra.set("captcha_sid", captcha.session_id.as_str());
            extra.set("captcha_key", answer);
        } else if let Some(text) = remote.confirmation_text.as_ref() {
            debug!(method = %call.method, "Requesting confirmation");
            let confirmed = remediation_result(handler.confirm(text).await, &remote)?;
            if !confirmed {
                return Err(VkError::Remote(remote));
            }
            extra.set("confirm", 1);
        } else if let Some(redirect_uri) = remote.redirect_uri.as_ref() {
            debug!(method = %call.method, "Resolving validation");
            let token = remediation_result(handler.resolve_validation(redirect_uri).await, &remote)?;
            extra.set("access_token", token);
        } else {
            return Err(VkError::Remote(remote));
        }

        call.params.force_merge(&extra);
        Ok(())
    }

    fn record_retry(&self, method: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry(method);
        }
    }
}

fn remediation_result<T>(result: VkResult<T>, remote: &RemoteError) -> VkResult<T> {
    result.map_err(|source| VkError::Remediation {
        source: Box::new(source),
        remote: remote.clone(),
    })
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("config", &self.config)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
