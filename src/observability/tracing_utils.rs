//! Span helpers and per-call trace records.

use std::time::{Duration, Instant};
use tracing::{span, Level, Span};

/// Create a span covering one engine call
pub fn create_call_span(method: &str, request_id: &str) -> Span {
    span!(
        Level::INFO,
        "vk_call",
        method = %method,
        request_id = %request_id,
        otel.kind = "client",
        otel.status_code = tracing::field::Empty,
        error.message = tracing::field::Empty,
    )
}

/// Record success on a span
pub fn record_success(span: &Span) {
    span.record("otel.status_code", "OK");
}

/// Record error on a span
pub fn record_error(span: &Span, error: &str) {
    span.record("otel.status_code", "ERROR");
    span.record("error.message", error);
}

/// Call-scoped trace info
#[derive(Debug, Clone)]
pub struct RequestTrace {
    /// Start time
    pub start_time: Instant,
    /// Request ID
    pub request_id: String,
    /// Remote method name
    pub method: String,
}

impl RequestTrace {
    /// Start tracing a call
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            method: method.into(),
        }
    }

    /// Span for this call
    pub fn span(&self) -> Span {
        create_call_span(&self.method, &self.request_id)
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get elapsed milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_trace() {
        let trace = RequestTrace::new("users.get");
        assert_eq!(trace.request_id.len(), 36);
        assert_eq!(trace.method, "users.get");
        assert_ne!(trace.request_id, RequestTrace::new("users.get").request_id);
    }

    #[test]
    fn test_span_records_without_subscriber() {
        let trace = RequestTrace::new("users.get");
        let span = trace.span();
        record_success(&span);
        record_error(&span, "boom");
    }
}
