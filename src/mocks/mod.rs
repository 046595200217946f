//! Mock implementations for testing.
//!
//! Provides a scripted transport that replays queued bodies, delays, and
//! failures while recording every request it receives.

use crate::errors::{DecodeError, NetworkError, VkError, VkResult};
use crate::transport::{FormRequest, HttpTransport, RawRequest};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Failure injected by a mock response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Connection could not be established
    ConnectionFailed,
    /// The transport timeout elapsed
    Timeout,
    /// Non-success HTTP status
    Status(u16),
}

impl MockFailure {
    fn into_error(self) -> VkError {
        let network = match self {
            MockFailure::ConnectionFailed => NetworkError::ConnectionFailed {
                message: "connection refused".to_string(),
            },
            MockFailure::Timeout => NetworkError::Timeout,
            MockFailure::Status(status) => NetworkError::Status { status },
        };
        VkError::Network(network)
    }
}

/// Mock response configuration
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Response body
    pub body: Bytes,
    /// Delay before responding
    pub delay_ms: Option<u64>,
    /// Failure to return instead of the body
    pub error: Option<MockFailure>,
}

impl MockResponse {
    /// Respond with a raw body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            delay_ms: None,
            error: None,
        }
    }

    /// Respond with `{"response": <payload>}`
    pub fn success(payload: &str) -> Self {
        Self::ok(crate::fixtures::success_body(payload))
    }

    /// Respond with an API error object
    pub fn api_error(code: i64, message: &str) -> Self {
        Self::ok(crate::fixtures::error_body(code, message))
    }

    /// Fail with a transport error
    pub fn failure(error: MockFailure) -> Self {
        Self {
            body: Bytes::new(),
            delay_ms: None,
            error: Some(error),
        }
    }

    /// Add delay to response
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = Some(ms);
        self
    }
}

/// Recorded request for verification
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Form fields, empty for raw requests
    pub fields: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// When the transport received the request
    pub received_at: Instant,
}

impl RecordedRequest {
    /// Value of a form field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Mock HTTP transport for testing
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Option<MockResponse>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockHttpTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Add a response to the queue
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    /// Add multiple responses
    pub fn add_responses(self, responses: impl IntoIterator<Item = MockResponse>) -> Self {
        self.responses.lock().extend(responses);
        self
    }

    /// Set default response when queue is empty
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Wrap in an `Arc` for sharing with a client
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Get the last recorded request
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Get remaining response count
    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().len()
    }

    /// Highest number of requests that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_request(&self, url: &str, method: &str, fields: Vec<(String, String)>, headers: &http::HeaderMap) {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            method: method.to_string(),
            fields,
            headers,
            received_at: Instant::now(),
        });
    }

    fn next_response(&self) -> VkResult<MockResponse> {
        let mut queue = self.responses.lock();
        queue
            .pop_front()
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| {
                VkError::Decode(DecodeError::UnexpectedEnvelope {
                    message: "No mock response configured".to_string(),
                })
            })
    }

    async fn respond(&self, response: MockResponse) -> VkResult<Bytes> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = response.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response.error {
            Some(failure) => Err(failure.into_error()),
            None => Ok(response.body),
        }
    }
}

impl Default for MockHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send_form(&self, request: FormRequest) -> VkResult<Bytes> {
        self.record_request(
            &request.url,
            request.method.as_str(),
            request.fields.clone(),
            &request.headers,
        );
        let response = self.next_response()?;
        self.respond(response).await
    }

    async fn send_raw(&self, request: RawRequest) -> VkResult<Bytes> {
        self.record_request(&request.url, request.method.as_str(), Vec::new(), &request.headers);
        let response = self.next_response()?;
        self.respond(response).await
    }
}

impl std::fmt::Debug for MockHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpTransport")
            .field("pending_responses", &self.responses.lock().len())
            .field("recorded_requests", &self.requests.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[tokio::test]
    async fn test_mock_transport_replays_queue_then_default() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::success("1"))
            .with_default_response(MockResponse::ok("fallback"));

        let request = FormRequest::post("https://api.vk.com/method/users.get", HeaderMap::new());
        let first = transport.send_form(request.clone()).await.unwrap();
        let second = transport.send_form(request).await.unwrap();

        assert_eq!(&first[..], br#"{"response":1}"#);
        assert_eq!(&second[..], b"fallback");
        assert_eq!(transport.remaining_responses(), 0);
    }

    #[tokio::test]
    async fn test_mock_transport_records_requests() {
        let transport = MockHttpTransport::new().add_response(MockResponse::success("1"));

        let request = FormRequest::post("https://api.vk.com/method/users.get", HeaderMap::new())
            .field("user_ids", "1");
        transport.send_form(request).await.unwrap();

        let recorded = transport.last_request().unwrap();
        assert_eq!(recorded.url, "https://api.vk.com/method/users.get");
        assert_eq!(recorded.method, "POST");
        assert_eq!(recorded.field("user_ids"), Some("1"));
    }

    #[tokio::test]
    async fn test_mock_transport_failure() {
        let transport =
            MockHttpTransport::new().add_response(MockResponse::failure(MockFailure::Status(503)));

        let request = RawRequest::get("https://vk.com/foaf.php?id=1", HeaderMap::new());
        let err = transport.send_raw(request).await.unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_queue_is_an_error() {
        let transport = MockHttpTransport::new();
        let request = RawRequest::get("https://vk.com/foaf.php?id=1", HeaderMap::new());
        assert!(transport.send_raw(request).await.is_err());
    }
}
