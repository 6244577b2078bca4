//! Inference Types
//!
//! The schema-constrained analysis payload and the error taxonomy for the
//! inference client.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during an inference request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InferenceError {
    /// API key is missing or not configured.
    AuthenticationFailed { message: String },

    /// No image bytes were supplied.
    EmptyImage,

    /// The image exceeds the configured size bound.
    ImageTooLarge { size_bytes: usize, max_bytes: usize },

    /// The image media type is not accepted by the service.
    UnsupportedMediaType { mime_type: String },

    /// A network or connection error occurred.
    NetworkError { message: String },

    /// The service returned a non-success HTTP status.
    ServerError {
        message: String,
        status: Option<u16>,
    },

    /// The response body was not parseable as the expected JSON.
    ParseError { message: String },

    /// The response was well-formed but missing the expected content path.
    MissingContent { message: String },

    /// The payload parsed but violated the required-field contract.
    SchemaViolation { missing: Vec<String> },

    /// Any other error.
    Other { message: String },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailed { message } => {
                write!(f, "authentication failed: {}", message)
            }
            Self::EmptyImage => write!(f, "no image supplied"),
            Self::ImageTooLarge {
                size_bytes,
                max_bytes,
            } => write!(
                f,
                "image size {} bytes exceeds maximum {} bytes",
                size_bytes, max_bytes
            ),
            Self::UnsupportedMediaType { mime_type } => {
                write!(f, "unsupported media type: {}", mime_type)
            }
            Self::NetworkError { message } => write!(f, "network error: {}", message),
            Self::ServerError { message, status } => {
                if let Some(code) = status {
                    write!(f, "server error (HTTP {}): {}", code, message)
                } else {
                    write!(f, "server error: {}", message)
                }
            }
            Self::ParseError { message } => write!(f, "parse error: {}", message),
            Self::MissingContent { message } => write!(f, "missing content: {}", message),
            Self::SchemaViolation { missing } => {
                write!(f, "response missing required fields: {}", missing.join(", "))
            }
            Self::Other { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for InferenceError {}

impl InferenceError {
    /// Whether this error consumes a retry attempt.
    ///
    /// Transport failures, unparseable payloads and contract violations are
    /// all retried uniformly; precondition and configuration failures fail
    /// fast before the retry loop runs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::NetworkError { .. }
                | InferenceError::ServerError { .. }
                | InferenceError::ParseError { .. }
                | InferenceError::MissingContent { .. }
                | InferenceError::SchemaViolation { .. }
        )
    }
}

/// Convenience alias for inference operation results.
pub type InferenceResult<T> = Result<T, InferenceError>;

// ---------------------------------------------------------------------------
// Analysis payload
// ---------------------------------------------------------------------------

/// Taxonomic classification block. Individual ranks are optional; the
/// container itself is required in every payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// Structured analysis of one image, as returned by the inference service.
///
/// Field names follow the wire contract (camelCase), which is also the shape
/// persisted to the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub scientific_name: String,
    pub common_name: String,
    pub summary: String,
    pub classification: Classification,
    pub ecological_role: String,
}
