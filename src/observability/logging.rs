//! Logging helpers that keep credentials out of log output.

use std::fmt;

/// Parameter names whose values are never logged
const SENSITIVE_PARAMS: &[&str] = &[
    "access_token",
    "sig",
    "captcha_key",
    "client_secret",
    "password",
    "code",
];

/// Wrapper for sensitive data that redacts on display
#[derive(Clone)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    /// Create a new redacted value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Get the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact a token, keeping a short prefix for correlation
pub fn redact_token(token: &str) -> String {
    match token.char_indices().nth(6) {
        Some((cut, _)) if token.len() > 12 => format!("{}...[REDACTED]", &token[..cut]),
        _ => "[REDACTED]".to_string(),
    }
}

/// Whether a parameter value must not appear in logs
pub fn is_sensitive_param(key: &str) -> bool {
    SENSITIVE_PARAMS.iter().any(|s| key.eq_ignore_ascii_case(s))
}

/// Copy of encoded form fields with sensitive values masked
pub fn redact_params(fields: &[(String, String)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(key, value)| {
            if is_sensitive_param(key) {
                (key.clone(), "[REDACTED]".to_string())
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

/// `key=value&...` rendering of redacted fields, for log lines
pub fn format_params(fields: &[(String, String)]) -> String {
    redact_params(fields)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
