//! Response classification.
//!
//! Decodes the raw body of an API response into a success payload or a
//! classified [`RemoteError`]. Decoding is pure; no retry decisions are
//! made here.

use crate::errors::{CaptchaChallenge, DecodeError, ErrorKind, RemoteError, VkResult};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decoded response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// `{"response": ...}`
    Success(SuccessPayload),
    /// `{"error": {...}}`
    Failure(RemoteError),
}

impl ApiResponse {
    /// Whether the response is a success
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success(_))
    }
}

/// Payload of a successful call
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPayload {
    /// Value of the `response` field
    pub response: Value,
    /// Per-call errors reported by the `execute` method
    pub execute_errors: Vec<RemoteError>,
}

impl SuccessPayload {
    /// Decode the payload into a concrete type
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> VkResult<T> {
        T::deserialize(&self.response).map_err(|e| {
            DecodeError::PayloadType {
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[derive(Deserialize)]
struct RequestParam {
    key: String,
    #[serde(default)]
    value: Value,
}

/// Classify a raw response body
pub fn classify(body: &[u8]) -> VkResult<ApiResponse> {
    let envelope: Value = serde_json::from_slice(body).map_err(DecodeError::from)?;

    let Value::Object(mut envelope) = envelope else {
        return Err(DecodeError::UnexpectedEnvelope {
            message: "top-level value is not an object".to_string(),
        }
        .into());
    };

    if let Some(error) = envelope.remove("error") {
        return Ok(ApiResponse::Failure(parse_error_object(error)?));
    }

    if let Some(response) = envelope.remove("response") {
        let execute_errors = match envelope.remove("execute_errors") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(parse_error_object)
                .collect::<VkResult<Vec<_>>>()?,
            _ => Vec::new(),
        };

        return Ok(ApiResponse::Success(SuccessPayload {
            response,
            execute_errors,
        }));
    }

    Err(DecodeError::UnexpectedEnvelope {
        message: "neither 'response' nor 'error' present".to_string(),
    }
    .into())
}

/// Build a [`RemoteError`] from an error object
pub fn parse_error_object(error: Value) -> VkResult<RemoteError> {
    let Value::Object(mut fields) = error else {
        return Err(DecodeError::UnexpectedEnvelope {
            message: "'error' is not an object".to_string(),
        }
        .into());
    };

    let code = fields
        .remove("error_code")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| DecodeError::UnexpectedEnvelope {
            message: "error object without numeric 'error_code'".to_string(),
        })?;

    let message = take_string(&mut fields, "error_msg").unwrap_or_default();
    let subcode = fields.remove("error_subcode").and_then(|v| v.as_i64());

    let request_params = match fields.remove("request_params") {
        Some(params) => serde_json::from_value::<Vec<RequestParam>>(params)
            .map_err(DecodeError::from)?
            .into_iter()
            .map(|p| (p.key, token_of(p.value)))
            .collect(),
        None => Vec::new(),
    };

    let captcha = match (
        take_string(&mut fields, "captcha_sid"),
        take_string(&mut fields, "captcha_img"),
    ) {
        (Some(session_id), Some(image_url)) => Some(CaptchaChallenge {
            session_id,
            image_url,
        }),
        (Some(session_id), None) => Some(CaptchaChallenge {
            session_id,
            image_url: String::new(),
        }),
        _ => None,
    };

    let redirect_uri = take_string(&mut fields, "redirect_uri");
    let confirmation_text = take_string(&mut fields, "confirmation_text");

    Ok(RemoteError {
        kind: ErrorKind::from_code(code),
        code,
        message,
        subcode,
        request_params,
        captcha,
        redirect_uri,
        confirmation_text,
        extra: fields,
    })
}

/// Remove a field and render it as a string; the API sends ids either way
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::Null => None,
        value => Some(token_of(value)),
    }
}

fn token_of(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
