//! Operations: one API action with its identifiers, token, and payload.
//!
//! # Design
//! There is a single `Operation` type. What distinguishes "update a cash
//! register" from "sign a receipt" is the static `Endpoint` it points at:
//! method, path template, and rule set. The catalog in `endpoints` is data.
//!
//! The invocation lifecycle is encoded in the types and only moves forward:
//!
//! ```text
//! Operation ──validate──▶ ValidatedOperation ──build──▶ PreparedRequest
//!                                                           │
//!                              transport + handle_response ─┘──▶ ApiResult
//! ```
//!
//! Each step consumes the previous value, so a payload cannot be changed
//! after validation and a prepared request cannot be re-validated.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::request::RequestBuilder;
use crate::types::Payload;
use crate::validation::{self, RuleSet, ValidationOptions};

/// Static description of one API action.
#[derive(Debug)]
pub struct Endpoint {
    /// Stable identifier used in logs, e.g. `cash_registers.update`.
    pub name: &'static str,
    pub method: HttpMethod,
    /// Path relative to the base URL, with `{placeholder}` identifiers.
    pub path: &'static str,
    pub rules: RuleSet,
}

/// One API action, ready to be validated and sent.
#[derive(Clone)]
pub struct Operation {
    endpoint: &'static Endpoint,
    token: String,
    path_params: Vec<(&'static str, String)>,
    payload: Payload,
}

impl Operation {
    pub fn new(endpoint: &'static Endpoint, token: impl Into<String>) -> Self {
        Self {
            endpoint,
            token: token.into(),
            path_params: Vec::new(),
            payload: Payload::new(),
        }
    }

    /// Bind a path identifier. Binding the same name twice keeps the last
    /// value.
    pub fn with_path_param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        match self.path_params.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.path_params.push((name, value)),
        }
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set a single payload field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &'static Endpoint {
        self.endpoint
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Check the payload against the endpoint's rule set.
    pub fn validate(self, options: ValidationOptions) -> Result<ValidatedOperation, ApiError> {
        validation::validate(&self.payload, &self.endpoint.rules, options)?;
        Ok(ValidatedOperation { inner: self })
    }

    /// Validate and build in one step, using the client configuration.
    pub fn prepare(self, config: &ClientConfig) -> Result<PreparedRequest, ApiError> {
        let options = ValidationOptions {
            enforce_metadata_limits: config.enforce_metadata_limits(),
        };
        self.validate(options)?.build(config)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("endpoint", &self.endpoint.name)
            .field("path_params", &self.path_params)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// An operation whose payload passed validation.
#[derive(Debug)]
pub struct ValidatedOperation {
    inner: Operation,
}

impl ValidatedOperation {
    pub fn endpoint(&self) -> &'static Endpoint {
        self.inner.endpoint
    }

    pub fn build(self, config: &ClientConfig) -> Result<PreparedRequest, ApiError> {
        let Operation {
            endpoint,
            token,
            path_params,
            payload,
        } = self.inner;

        let request = RequestBuilder::new(config).build(
            endpoint.method,
            endpoint.path,
            &path_params,
            &token,
            &payload,
        )?;
        debug!(
            operation = endpoint.name,
            method = %request.method,
            url = %request.url,
            "request prepared"
        );

        Ok(PreparedRequest { endpoint, request })
    }
}

/// A built request, ready for a transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    endpoint: &'static Endpoint,
    request: HttpRequest,
}

impl PreparedRequest {
    pub fn endpoint(&self) -> &'static Endpoint {
        self.endpoint
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn into_request(self) -> HttpRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::validation::Constraint;
    use serde_json::json;

    static WIDGET_UPDATE: Endpoint = Endpoint {
        name: "widgets.update",
        method: HttpMethod::Patch,
        path: "/widget/{widget_id}",
        rules: RuleSet {
            required: &["state"],
            optional: &["metadata"],
            constraints: &[("state", Constraint::OneOf(&["ON", "OFF"]))],
        },
    };

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:3000").unwrap()
    }

    #[test]
    fn prepare_runs_validation_then_build() {
        let prepared = Operation::new(&WIDGET_UPDATE, "tok")
            .with_path_param("widget_id", "w-1")
            .with_field("state", "ON")
            .prepare(&config())
            .unwrap();

        assert_eq!(prepared.endpoint().name, "widgets.update");
        let req = prepared.request();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.url, "http://localhost:3000/widget/w-1");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"state": "ON"}));
    }

    #[test]
    fn validate_and_build_as_separate_steps() {
        let validated = Operation::new(&WIDGET_UPDATE, "tok")
            .with_path_param("widget_id", "w-2")
            .with_field("state", "OFF")
            .validate(ValidationOptions::default())
            .unwrap();
        assert_eq!(validated.endpoint().name, "widgets.update");
        assert_eq!(validated.endpoint().method, HttpMethod::Patch);

        let request = validated.build(&config()).unwrap().into_request();
        assert_eq!(request.url, "http://localhost:3000/widget/w-2");
        assert_eq!(request.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn validation_failure_stops_before_build() {
        // No path param either: the validation error must win.
        let err = Operation::new(&WIDGET_UPDATE, "tok")
            .prepare(&config())
            .unwrap_err();
        assert_eq!(err, ApiError::missing("state"));
    }

    #[test]
    fn missing_path_param_is_preflight() {
        let err = Operation::new(&WIDGET_UPDATE, "tok")
            .with_field("state", "OFF")
            .prepare(&config())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingRequiredField);
        assert_eq!(err.field(), Some("widget_id"));
    }

    #[test]
    fn rebinding_path_param_replaces_value() {
        let op = Operation::new(&WIDGET_UPDATE, "tok")
            .with_path_param("widget_id", "a")
            .with_path_param("widget_id", "b");
        assert_eq!(op.path_param("widget_id"), Some("b"));
    }

    #[test]
    fn strict_config_enforces_metadata_limits() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("note".to_string(), json!("n".repeat(600)));
        let op = Operation::new(&WIDGET_UPDATE, "tok")
            .with_path_param("widget_id", "w-1")
            .with_field("state", "ON")
            .with_field("metadata", metadata);

        assert!(op.clone().prepare(&config()).is_ok());
        let strict = config().with_metadata_limits_enforced(true);
        let err = op.prepare(&strict).unwrap_err();
        assert_eq!(err.field(), Some("metadata"));
    }

    #[test]
    fn debug_output_omits_token() {
        let op = Operation::new(&WIDGET_UPDATE, "super-secret");
        let debug = format!("{op:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("widgets.update"));
    }
}
