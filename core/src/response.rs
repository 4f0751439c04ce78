//! Response classification.
//!
//! # Design
//! `handle_response` is the single place where a status code and body become
//! either an `ApiResponse` or a classified `ApiError`. It is pure; retries and
//! backoff belong to the caller, who can branch on `ApiError::is_retryable`.
//!
//! - 2xx: the body must be JSON. An empty body (e.g. 204) is `null`.
//! - 4xx: `ClientError`, with the service's message when the body has one.
//! - 5xx: `ServerError`.
//! - anything else (1xx, 3xx): `MalformedResponse`, since the API never
//!   legitimately answers with those.

use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::http::HttpResponse;
use crate::types::ApiResponse;

/// Upper bound on a message lifted verbatim from a non-JSON error body.
const MAX_MESSAGE_CHARS: usize = 512;

/// Classify a completed exchange.
pub fn handle_response(response: HttpResponse) -> ApiResult {
    let status = response.status;
    match status {
        200..=299 => parse_success(response),
        400..=499 => Err(ApiError::ClientError {
            status,
            message: error_message(&response),
            body: response.body_text(),
        }),
        500..=599 => Err(ApiError::ServerError {
            status,
            message: error_message(&response),
            body: response.body_text(),
        }),
        _ => Err(ApiError::MalformedResponse {
            status,
            message: format!("unexpected HTTP status {status}"),
            body: response.body_text(),
        }),
    }
}

fn parse_success(response: HttpResponse) -> ApiResult {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApiResponse {
            status: response.status,
            body: Value::Null,
        });
    }

    match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => Ok(ApiResponse {
            status: response.status,
            body,
        }),
        Err(e) => Err(ApiError::MalformedResponse {
            status: response.status,
            message: format!("response body is not valid JSON: {e}"),
            body: response.body_text(),
        }),
    }
}

/// Best human-readable message for an error response: the service's
/// `message` or `error` field when the body is JSON, otherwise the body text,
/// otherwise the canonical reason phrase.
fn error_message(response: &HttpResponse) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(&response.body) {
        for key in ["message", "error", "code"] {
            if let Some(Value::String(text)) = fields.get(key) {
                if !text.trim().is_empty() {
                    return text.clone();
                }
            }
        }
    }

    let text = response.body_text();
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_MESSAGE_CHARS).collect();
    }

    reason_phrase(response.status).to_string()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        400..=499 => "Client Error",
        500..=599 => "Server Error",
        _ => "Unexpected Status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    #[test]
    fn success_parses_json_body() {
        let result = handle_response(HttpResponse::new(200, r#"{"id":"x"}"#)).unwrap();
        assert_eq!(
            result,
            ApiResponse {
                status: 200,
                body: json!({"id": "x"}),
            }
        );
    }

    #[test]
    fn success_with_empty_body_is_null() {
        let result = handle_response(HttpResponse::new(204, "")).unwrap();
        assert_eq!(result.status, 204);
        assert_eq!(result.body, Value::Null);
    }

    #[test]
    fn success_with_bad_json_is_malformed() {
        let err = handle_response(HttpResponse::new(200, "not json")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.body(), Some("not json"));
    }

    #[test]
    fn conflict_is_client_error_with_service_message() {
        let body = r#"{"status_code":409,"code":"E_CONFLICT","message":"Cash register already exists"}"#;
        let err = handle_response(HttpResponse::new(409, body)).unwrap_err();
        match &err {
            ApiError::ClientError {
                status,
                message,
                body: raw,
            } => {
                assert_eq!(*status, 409);
                assert_eq!(message, "Cash register already exists");
                assert_eq!(raw, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn client_error_falls_back_to_text_then_reason() {
        let err = handle_response(HttpResponse::new(401, "token expired")).unwrap_err();
        assert!(matches!(
            err,
            ApiError::ClientError { ref message, .. } if message == "token expired"
        ));

        let err = handle_response(HttpResponse::new(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::ClientError { ref message, .. } if message == "Not Found"));
    }

    #[test]
    fn server_error_is_retryable() {
        let err =
            handle_response(HttpResponse::new(503, r#"{"error":"FON unavailable"}"#)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ServerError);
        assert_eq!(err.status(), Some(503));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("FON unavailable"));
    }

    #[test]
    fn redirect_is_unexpected() {
        let err = handle_response(HttpResponse::new(302, "")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedResponse);
    }

    #[test]
    fn long_text_messages_are_truncated() {
        let err = handle_response(HttpResponse::new(400, "x".repeat(2000))).unwrap_err();
        match err {
            ApiError::ClientError { message, body, .. } => {
                assert_eq!(message.len(), MAX_MESSAGE_CHARS);
                assert_eq!(body.len(), 2000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
