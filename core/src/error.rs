//! Error types for the SIGN AT client.
//!
//! # Design
//! Every failure an invocation can produce is one `ApiError` variant, and
//! each variant carries the context needed to act on it without re-running
//! the call: the field name for pre-flight failures, the status code and raw
//! body for rejected requests, the transport detail when no response arrived.
//! `FailureKind` is the same taxonomy without payloads, for callers that only
//! branch on the category (retry policies, metrics labels).

use std::fmt;

use serde_json::Value;

use crate::transport::{TransportError, TransportErrorKind};

/// Result of invoking an operation.
pub type ApiResult<T = crate::types::ApiResponse> = Result<T, ApiError>;

/// Errors returned by validation, request building, and response handling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// A required payload field (or path identifier) is absent or null.
    #[error("missing required field `{field}`")]
    MissingRequiredField { field: String },

    /// A payload field is present but does not satisfy its constraint.
    #[error("invalid value for `{field}`: {value}{}", describe_expected(.expected))]
    InvalidFieldValue {
        field: String,
        value: Value,
        expected: Option<String>,
    },

    /// The service answered but the body is not what the protocol promises.
    #[error("malformed response (HTTP {status}): {message}")]
    MalformedResponse {
        status: u16,
        message: String,
        body: String,
    },

    /// The service rejected the request (4xx).
    #[error("request rejected (HTTP {status}): {message}")]
    ClientError {
        status: u16,
        message: String,
        body: String,
    },

    /// The service or its upstream tax-authority integration failed (5xx).
    #[error("service unavailable (HTTP {status}): {message}")]
    ServerError {
        status: u16,
        message: String,
        body: String,
    },

    /// No response was received.
    #[error("transport failure ({kind}): {detail}")]
    TransportError {
        kind: TransportErrorKind,
        detail: String,
    },
}

fn describe_expected(expected: &Option<String>) -> String {
    match expected {
        Some(expected) => format!(" (expected {expected})"),
        None => String::new(),
    }
}

/// Category of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MissingRequiredField,
    InvalidFieldValue,
    MalformedResponse,
    ClientError,
    ServerError,
    TransportError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingRequiredField => "missing_required_field",
            FailureKind::InvalidFieldValue => "invalid_field_value",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::ClientError => "client_error",
            FailureKind::ServerError => "server_error",
            FailureKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ApiError {
    pub fn missing(field: impl Into<String>) -> Self {
        ApiError::MissingRequiredField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, value: Value, expected: Option<String>) -> Self {
        ApiError::InvalidFieldValue {
            field: field.into(),
            value,
            expected,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::MissingRequiredField { .. } => FailureKind::MissingRequiredField,
            ApiError::InvalidFieldValue { .. } => FailureKind::InvalidFieldValue,
            ApiError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            ApiError::ClientError { .. } => FailureKind::ClientError,
            ApiError::ServerError { .. } => FailureKind::ServerError,
            ApiError::TransportError { .. } => FailureKind::TransportError,
        }
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::MalformedResponse { status, .. }
            | ApiError::ClientError { status, .. }
            | ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body, when a response was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::MalformedResponse { body, .. }
            | ApiError::ClientError { body, .. }
            | ApiError::ServerError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Name of the offending field for pre-flight failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            ApiError::MissingRequiredField { field }
            | ApiError::InvalidFieldValue { field, .. } => Some(field),
            _ => None,
        }
    }

    /// True for failures raised before any request was sent.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::MissingRequiredField | FailureKind::InvalidFieldValue
        )
    }

    /// True when sending the identical request again may succeed.
    ///
    /// Every SIGN AT call is a PUT or PATCH against a caller-chosen id, so a
    /// retry never creates a duplicate resource.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::ServerError | FailureKind::TransportError
        )
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::TransportError {
            kind: err.kind(),
            detail: err.detail().to_string(),
        }
    }
}
