//! Error types for the Veracode client core.
//!
//! Every failure surfaced by the client is a [`VeracodeError`]. Failures reported by
//! the Veracode platform itself are normalized into a single [`ApiError`] shape, no
//! matter which of the upstream error-body dialects the endpoint used.

use serde_json::Value;
use std::fmt;

/// Result type alias for Veracode client operations
pub type Result<T> = std::result::Result<T, VeracodeError>;

/// Custom error type for Veracode client operations
#[derive(thiserror::Error, Debug)]
pub enum VeracodeError {
    /// The API secret could not be used to sign the request (not hex, clock failure, ...)
    #[error("Signing error: {0}")]
    Signing(String),

    /// The API key id carries a malformed or unknown region prefix
    #[error("Region resolution failed for credential {key_id}: {reason}")]
    Region { key_id: String, reason: String },

    /// The caller cancelled while the request was queued on the rate limiter
    #[error("Request cancelled while waiting for a rate limit token")]
    RateLimitCancelled,

    /// The caller cancelled (or the deadline expired) while the request was in flight
    #[error("Request cancelled during transmission")]
    Cancelled,

    /// The response carried a `Content-Type` the decoder does not understand
    #[error("response header: 'Content-Type' contains unsupported value: {0}")]
    UnsupportedContentType(String),

    /// The Veracode platform reported an error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The underlying HTTP stack failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A custom transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A success response body could not be decoded into the destination type
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration or request construction is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VeracodeError {
    /// Returns the normalized API error, if the platform reported one.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            VeracodeError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// True for both cancellation flavours.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            VeracodeError::Cancelled | VeracodeError::RateLimitCancelled
        )
    }
}

impl From<serde_json::Error> for VeracodeError {
    fn from(error: serde_json::Error) -> Self {
        VeracodeError::Decode(format!("invalid JSON body: {error}"))
    }
}

impl From<quick_xml::DeError> for VeracodeError {
    fn from(error: quick_xml::DeError) -> Self {
        VeracodeError::Decode(format!("invalid XML body: {error}"))
    }
}

/// An error reported by the Veracode platform.
///
/// The Veracode APIs return several different error bodies. All of them collapse
/// into this shape:
///
/// ```text
/// {"http_code": 400, "http_status": "Bad Request", "message": "Invalid UUID string: abcd"}
/// {"errors": ["team_id: Invalid value.", "role_id: not a valid GUID"], "status": 400}
/// {"_embedded": {"api_errors": [{"id": "abcd", "code": "NOT_FOUND", "title": "..."}]}}
/// <error>Build not found</error>
/// ```
///
/// An empty `messages` list means the platform failed without a body we could read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code of the response
    pub status: u16,
    /// Path of the endpoint that was called
    pub endpoint: String,
    /// Messages extracted from the error body, in document order
    pub messages: Vec<String>,
}

impl ApiError {
    pub fn new(status: u16, endpoint: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            status,
            endpoint: endpoint.into(),
            messages,
        }
    }

    /// Normalize a JSON error body.
    ///
    /// Fields are tried in a fixed order: a direct `title`, a direct `message`, the
    /// `errors` array, then the titles under `_embedded.api_errors`. The first one that
    /// is present wins. A body matching none of them, or one that is not JSON at all,
    /// produces an error without messages.
    #[must_use]
    pub fn from_json_body(status: u16, endpoint: impl Into<String>, body: &[u8]) -> Self {
        let messages = serde_json::from_slice::<Value>(body)
            .map(|value| json_error_messages(&value))
            .unwrap_or_default();

        Self::new(status, endpoint, messages)
    }

    /// Normalize the character data of a legacy `<error>` element.
    #[must_use]
    pub fn from_xml_error(status: u16, endpoint: impl Into<String>, text: &str) -> Self {
        Self::new(status, endpoint, vec![text.trim().to_string()])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "api error returned from {} ({}): [\"{}\"]",
            self.endpoint,
            self.status,
            self.messages.join("\", \"")
        )
    }
}

impl std::error::Error for ApiError {}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn json_error_messages(body: &Value) -> Vec<String> {
    if let Some(title) = non_empty_str(body, "title") {
        return vec![title.to_string()];
    }

    if let Some(message) = non_empty_str(body, "message") {
        return vec![message.to_string()];
    }

    if let Some(errors) = body.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        return errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
    }

    if let Some(api_errors) = body
        .pointer("/_embedded/api_errors")
        .and_then(Value::as_array)
        && !api_errors.is_empty()
    {
        return api_errors
            .iter()
            .map(|e| {
                e.get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
    }

    Vec::new()
}
