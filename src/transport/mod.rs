//! HTTP transport layer for the VK client.
//!
//! Provides low-level HTTP communication with the VK API and the
//! request-signing hook applied to outgoing form fields.

use crate::errors::{NetworkError, VkError, VkResult};
use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use http::{HeaderMap, Method};
use reqwest::{Client, ClientBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// HTTP transport trait for making API requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a form-encoded request and return the raw body
    async fn send_form(&self, request: FormRequest) -> VkResult<Bytes>;

    /// Send a raw request and receive raw bytes
    async fn send_raw(&self, request: RawRequest) -> VkResult<Bytes>;
}

/// Form-encoded request
#[derive(Debug, Clone)]
pub struct FormRequest {
    /// HTTP method
    pub method: Method,
    /// URL
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Form fields
    pub fields: Vec<(String, String)>,
    /// Request timeout
    pub timeout: Option<Duration>,
}

impl FormRequest {
    /// Create a new form POST request
    pub fn post(url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers,
            fields: Vec::new(),
            timeout: None,
        }
    }

    /// Add a form field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Replace all form fields
    pub fn fields(mut self, fields: Vec<(String, String)>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a form field
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Bodyless request for non-JSON responses
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// HTTP method
    pub method: Method,
    /// URL
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request timeout
    pub timeout: Option<Duration>,
}

impl RawRequest {
    /// Create a new raw GET request
    pub fn get(url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers,
            timeout: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Hook that adds client-side signature parameters to a request.
///
/// Called with the fully encoded, key-sorted field list right before each
/// attempt is sent.
pub trait RequestSigner: Send + Sync {
    /// Sign the fields of a call to `method`
    fn sign(&self, method: &str, fields: &mut Vec<(String, String)>) -> VkResult<()>;
}

/// Signs requests with `sig = hex(HMAC-SHA256(secret, "/method/<name>?<form>"))`
pub struct HmacSigner {
    secret: SecretString,
    param: String,
}

impl HmacSigner {
    /// Create a signer using the `sig` parameter
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            param: "sig".to_string(),
        }
    }

    /// Use a different parameter name for the signature
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// Compute the signature for already-encoded fields
    pub fn signature(&self, method: &str, fields: &[(String, String)]) -> VkResult<String> {
        let query = fields
            .iter()
            .filter(|(k, _)| k != &self.param)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let payload = format!("/method/{}?{}", method, query);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| VkError::Signing {
                message: e.to_string(),
            })?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl RequestSigner for HmacSigner {
    fn sign(&self, method: &str, fields: &mut Vec<(String, String)>) -> VkResult<()> {
        let sig = self.signature(method, fields)?;
        fields.retain(|(k, _)| k != &self.param);
        fields.push((self.param.clone(), sig));
        Ok(())
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"[REDACTED]")
            .field("param", &self.param)
            .finish()
    }
}

/// Default HTTP transport implementation using reqwest
pub struct ReqwestTransport {
    client: Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a new transport with the given timeout
    pub fn new(timeout: Duration) -> VkResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vk-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VkError::Network(NetworkError::Http(e.to_string())))?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Create a new transport with a pre-built client
    pub fn with_client(client: Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    async fn read_body(&self, response: Response) -> VkResult<Bytes> {
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Request failed with non-success status");
            return Err(VkError::Network(NetworkError::Status {
                status: status.as_u16(),
            }));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| VkError::Network(NetworkError::from(e)))?;

        debug!(body_len = body.len(), "Received response");
        Ok(body)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(url = %request.url, field_count = request.fields.len()))]
    async fn send_form(&self, request: FormRequest) -> VkResult<Bytes> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .form(&request.fields)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| VkError::Network(NetworkError::from(e)))?;

        self.read_body(response).await
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send_raw(&self, request: RawRequest) -> VkResult<Bytes> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| VkError::Network(NetworkError::from(e)))?;

        self.read_body(response).await
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
