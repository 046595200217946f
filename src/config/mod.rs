//! Configuration management for the VK client.
//!
//! Supports configuration via:
//! - Explicit values
//! - Environment variables
//! - Builder pattern

use crate::errors::{ConfigurationError, VkError, VkResult};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Kind of access token, which decides the service's rate ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// User access token
    User,
    /// Community (group) access token
    Group,
    /// Application service token
    Service,
}

impl TokenKind {
    /// Documented requests-per-second ceiling for this token kind
    pub fn requests_per_second(&self) -> f64 {
        match self {
            TokenKind::User => 3.0,
            TokenKind::Group => 20.0,
            TokenKind::Service => 3.0,
        }
    }
}

impl FromStr for TokenKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(TokenKind::User),
            "group" | "community" => Ok(TokenKind::Group),
            "service" => Ok(TokenKind::Service),
            other => Err(ConfigurationError::InvalidTokenKind(other.to_string())),
        }
    }
}

/// Bearer credential attached to a client.
///
/// Immutable; swap the whole credential on the client to change it.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
    kind: TokenKind,
    app_id: Option<i64>,
    api_version: String,
    lang: Option<String>,
}

impl Credential {
    /// Create a user credential for the default API version
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            kind: TokenKind::User,
            app_id: None,
            api_version: crate::DEFAULT_API_VERSION.to_string(),
            lang: None,
        }
    }

    /// Set the token kind
    pub fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the application id.
    ///
    /// Informational only: the API resolves the app from the token, so the
    /// id is never sent with a call.
    pub fn with_app_id(mut self, app_id: i64) -> Self {
        self.app_id = Some(app_id);
        self
    }

    /// Set the API version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the response language
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Token kind
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Application id the token was issued for, if known
    pub fn app_id(&self) -> Option<i64> {
        self.app_id
    }

    /// API version sent as `v`
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Language sent as `lang`
    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Expose the token for use in requests
    pub(crate) fn expose(&self) -> &str {
        self.token.expose_secret()
    }

    /// Validate the credential
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(ConfigurationError::MissingToken);
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "API version must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("app_id", &self.app_id)
            .field("api_version", &self.api_version)
            .field("lang", &self.lang)
            .finish()
    }
}

/// Configuration for the VK client
#[derive(Clone)]
pub struct VkConfig {
    /// Credential for API requests
    pub(crate) credential: Option<Credential>,
    /// Base URL for API requests
    pub base_url: Url,
    /// Per-request transport timeout
    pub timeout: Duration,
    /// Upper bound for a whole call, including retries
    pub call_deadline: Option<Duration>,
    /// Requests per second allowed by the rate governor
    pub requests_per_second: f64,
    /// Burst capacity of the rate governor
    pub burst: u32,
    /// Consecutive rate-limit errors after which a call fails
    pub max_retries: u32,
    /// Immediate retries for transient network failures
    pub max_network_retries: u32,
    /// Remediation rounds (captcha, validation) allowed per call
    pub max_remediations: u32,
    /// First backoff delay after a rate-limit error
    pub initial_backoff: Duration,
    /// Ceiling for the backoff delay
    pub backoff_ceiling: Duration,
    /// Default headers
    pub default_headers: HeaderMap,
}

impl std::fmt::Debug for VkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VkConfig")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("call_deadline", &self.call_deadline)
            .field("requests_per_second", &self.requests_per_second)
            .field("burst", &self.burst)
            .field("max_retries", &self.max_retries)
            .field("max_network_retries", &self.max_network_retries)
            .field("max_remediations", &self.max_remediations)
            .field("initial_backoff", &self.initial_backoff)
            .field("backoff_ceiling", &self.backoff_ceiling)
            .finish()
    }
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            credential: None,
            base_url: default_base_url(),
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECS),
            call_deadline: None,
            requests_per_second: TokenKind::User.requests_per_second(),
            burst: 1,
            max_retries: crate::DEFAULT_MAX_RETRIES,
            max_network_retries: crate::DEFAULT_MAX_NETWORK_RETRIES,
            max_remediations: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_ceiling: Duration::from_secs(30),
            default_headers: HeaderMap::new(),
        }
    }
}

fn default_base_url() -> Url {
    match Url::parse(crate::DEFAULT_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("DEFAULT_BASE_URL is a valid URL"),
    }
}

impl VkConfig {
    /// Create a new configuration builder
    pub fn builder() -> VkConfigBuilder {
        VkConfigBuilder::new()
    }

    /// Create configuration from environment variables
    pub fn from_env() -> VkResult<Self> {
        let mut builder = VkConfigBuilder::new();

        let token = std::env::var("VK_TOKEN")
            .map_err(|_| ConfigurationError::EnvVar("VK_TOKEN is not set".to_string()))?;
        let mut credential = Credential::new(token);

        if let Ok(kind) = std::env::var("VK_TOKEN_KIND") {
            credential = credential.with_kind(kind.parse()?);
        }

        if let Ok(app_id) = std::env::var("VK_APP_ID") {
            let id = app_id
                .parse::<i64>()
                .map_err(|e| ConfigurationError::EnvVar(format!("VK_APP_ID: {}", e)))?;
            credential = credential.with_app_id(id);
        }

        if let Ok(version) = std::env::var("VK_API_VERSION") {
            credential = credential.with_api_version(version);
        }

        if let Ok(lang) = std::env::var("VK_LANG") {
            credential = credential.with_lang(lang);
        }

        builder = builder.credential(credential);

        if let Ok(url) = std::env::var("VK_BASE_URL") {
            builder = builder.base_url(&url)?;
        }

        if let Ok(timeout) = std::env::var("VK_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(secs));
            }
        }

        if let Ok(retries) = std::env::var("VK_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                builder = builder.max_retries(n);
            }
        }

        if let Ok(rps) = std::env::var("VK_REQUESTS_PER_SECOND") {
            if let Ok(n) = rps.parse::<f64>() {
                builder = builder.requests_per_second(n);
            }
        }

        builder.build()
    }

    /// Get the credential if available
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Build the full URL for a method
    pub fn build_url(&self, method: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = method.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> VkResult<()> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(VkError::Configuration(ConfigurationError::MissingToken))?;
        credential.validate()?;

        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(invalid("requests_per_second must be positive"));
        }

        if self.burst == 0 {
            return Err(invalid("burst must be at least 1"));
        }

        if self.backoff_ceiling < self.initial_backoff {
            return Err(invalid("backoff_ceiling must not be below initial_backoff"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> VkError {
    VkError::Configuration(ConfigurationError::InvalidConfiguration {
        message: message.to_string(),
    })
}

/// Builder for VkConfig
#[derive(Default)]
pub struct VkConfigBuilder {
    config: VkConfig,
    explicit_rate: bool,
}

impl VkConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: VkConfig::default(),
            explicit_rate: false,
        }
    }

    /// Set a user token with default version
    pub fn token(self, token: &str) -> Self {
        self.credential(Credential::new(token))
    }

    /// Set the credential.
    ///
    /// Unless a rate was set explicitly, the governor rate follows the
    /// token kind.
    pub fn credential(mut self, credential: Credential) -> Self {
        if !self.explicit_rate {
            self.config.requests_per_second = credential.kind().requests_per_second();
        }
        self.config.credential = Some(credential);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: &str) -> Result<Self, ConfigurationError> {
        self.config.base_url =
            Url::parse(url).map_err(|e| ConfigurationError::InvalidConfiguration {
                message: format!("Invalid URL: {}", e),
            })?;
        Ok(self)
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set a default deadline for whole calls
    pub fn call_deadline(mut self, deadline: Duration) -> Self {
        self.config.call_deadline = Some(deadline);
        self
    }

    /// Set the governor rate
    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config.requests_per_second = rps;
        self.explicit_rate = true;
        self
    }

    /// Set the governor burst capacity
    pub fn burst(mut self, burst: u32) -> Self {
        self.config.burst = burst;
        self
    }

    /// Set the rate-limit retry budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the network retry budget
    pub fn max_network_retries(mut self, retries: u32) -> Self {
        self.config.max_network_retries = retries;
        self
    }

    /// Set the remediation budget
    pub fn max_remediations(mut self, n: u32) -> Self {
        self.config.max_remediations = n;
        self
    }

    /// Set the first backoff delay
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.config.initial_backoff = delay;
        self
    }

    /// Set the backoff ceiling
    pub fn backoff_ceiling(mut self, ceiling: Duration) -> Self {
        self.config.backoff_ceiling = ceiling;
        self
    }

    /// Add a default header
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        if let Ok(header_name) = name.parse::<http::header::HeaderName>() {
            if let Ok(header_value) = value.parse::<http::header::HeaderValue>() {
                self.config.default_headers.insert(header_name, header_value);
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> VkResult<VkConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation (for testing)
    pub fn build_unchecked(self) -> VkConfig {
        self.config
    }
}
