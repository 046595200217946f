//! Error types for the VK client.
//!
//! Provides the error hierarchy for the invocation engine, including the
//! fixed mapping from VK API error codes to semantic error kinds.

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for VK operations
pub type VkResult<T> = Result<T, VkError>;

/// Root error type for the VK client
#[derive(Error, Debug)]
pub enum VkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A parameter value has no wire representation
    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter {
        /// Parameter name
        key: String,
        /// Why the value could not be encoded
        reason: String,
    },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The caller-supplied deadline elapsed
    #[error("Call deadline exceeded after {elapsed:?}")]
    Timeout {
        /// Time spent before the call was abandoned
        elapsed: Duration,
    },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error object returned by the API
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// A remediation handler failed to resolve a challenge
    #[error("Remediation failed for {remote}: {source}")]
    Remediation {
        /// Error produced by the handler
        source: Box<VkError>,
        /// The remote error that required remediation
        remote: RemoteError,
    },

    /// Request signing failed
    #[error("Signing error: {message}")]
    Signing {
        /// Error message
        message: String,
    },
}

impl VkError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "VK_CONFIG",
            Self::InvalidParameter { .. } => "VK_PARAMETER",
            Self::Network(_) => "VK_NETWORK",
            Self::Timeout { .. } => "VK_TIMEOUT",
            Self::Decode(_) => "VK_DECODE",
            Self::Remote(_) => "VK_REMOTE",
            Self::Remediation { .. } => "VK_REMEDIATION",
            Self::Signing { .. } => "VK_SIGNING",
        }
    }

    /// The remote error, if this failure came from the API
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(remote) => Some(remote),
            Self::Remediation { remote, .. } => Some(remote),
            _ => None,
        }
    }

    /// The remote error kind, if this failure came from the API
    pub fn kind(&self) -> Option<ErrorKind> {
        self.remote().map(|r| r.kind)
    }

    /// Check if this error is a transient condition worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            Self::Remote(r) => r.kind == ErrorKind::TooManyRequests,
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Missing token
    #[error("Access token is missing")]
    MissingToken,

    /// Invalid token kind
    #[error("Invalid token kind: {0}")]
    InvalidTokenKind(String),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// The per-request transport timeout elapsed
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl NetworkError {
    /// Whether a fresh attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => true,
            Self::Status { status } => *status >= 500,
            Self::Http(_) => false,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::ConnectionFailed {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            NetworkError::Status {
                status: status.as_u16(),
            }
        } else {
            NetworkError::Http(err.to_string())
        }
    }
}

/// Response decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Body is not valid JSON
    #[error("Malformed JSON: {message}")]
    MalformedJson {
        /// Error message
        message: String,
    },

    /// Body is JSON but carries neither `response` nor `error`
    #[error("Unexpected envelope: {message}")]
    UnexpectedEnvelope {
        /// Error message
        message: String,
    },

    /// Payload did not match the requested type
    #[error("Payload type mismatch: {message}")]
    PayloadType {
        /// Error message
        message: String,
    },

    /// XML document could not be parsed
    #[error("XML error: {message}")]
    Xml {
        /// Error message
        message: String,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::MalformedJson {
            message: err.to_string(),
        }
    }
}

/// Semantic classification of a VK API error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Access to the method or object is denied
    AccessDenied,
    /// The access token or signature is not valid
    InvalidToken,
    /// Request rate or quota exceeded
    TooManyRequests,
    /// A captcha must be solved before the call can proceed
    CaptchaRequired,
    /// The user must pass validation or confirm the action
    ValidationRequired,
    /// The user was deleted or banned
    UserBanned,
    /// A parameter is missing or invalid
    ParameterError,
    /// Any other documented or undocumented code
    Unknown(i64),
}

impl ErrorKind {
    /// Map a VK API error code to its kind.
    ///
    /// The table follows the API's published error list.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 | 7 | 11 | 15 | 16 | 20 | 21 | 23 | 25 | 30 | 200 | 201 | 203 | 260 | 500 | 600 => {
                Self::AccessDenied
            }
            4 | 5 | 27 | 28 | 1116 => Self::InvalidToken,
            6 | 9 | 29 => Self::TooManyRequests,
            14 => Self::CaptchaRequired,
            17 | 24 => Self::ValidationRequired,
            18 | 3610 => Self::UserBanned,
            3 | 8 | 100 | 101 | 113 | 150 => Self::ParameterError,
            other => Self::Unknown(other),
        }
    }

    /// Whether the kind needs caller-side remediation
    pub fn needs_remediation(&self) -> bool {
        matches!(self, Self::CaptchaRequired | Self::ValidationRequired)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied => write!(f, "AccessDenied"),
            Self::InvalidToken => write!(f, "InvalidToken"),
            Self::TooManyRequests => write!(f, "TooManyRequests"),
            Self::CaptchaRequired => write!(f, "CaptchaRequired"),
            Self::ValidationRequired => write!(f, "ValidationRequired"),
            Self::UserBanned => write!(f, "UserBanned"),
            Self::ParameterError => write!(f, "ParameterError"),
            Self::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// Captcha challenge attached to error 14
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// Captcha session id, sent back as `captcha_sid`
    pub session_id: String,
    /// URL of the captcha image
    pub image_url: String,
}

/// Error object returned by the API, with its classification
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} error {code}: {message}")]
pub struct RemoteError {
    /// Classified kind
    pub kind: ErrorKind,
    /// Numeric code, verbatim
    pub code: i64,
    /// Error message, verbatim
    pub message: String,
    /// Optional subcode
    pub subcode: Option<i64>,
    /// Request parameters echoed back by the API
    pub request_params: Vec<(String, String)>,
    /// Captcha challenge (error 14)
    pub captcha: Option<CaptchaChallenge>,
    /// Validation redirect URL (error 17)
    pub redirect_uri: Option<String>,
    /// Confirmation prompt (error 24)
    pub confirmation_text: Option<String>,
    /// Remaining fields of the error object
    pub extra: Map<String, Value>,
}

impl RemoteError {
    /// Create an error with only code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_code(code),
            code,
            message: message.into(),
            subcode: None,
            request_params: Vec::new(),
            captcha: None,
            redirect_uri: None,
            confirmation_text: None,
            extra: Map::new(),
        }
    }
}
