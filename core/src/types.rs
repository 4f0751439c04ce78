//! Payload and response types.
//!
//! # Design
//! Payloads stay untyped (`serde_json::Map`) because the validator works on
//! arbitrary named fields; the per-endpoint rule sets carry the shape. Typed
//! response DTOs are offered on top of `ApiResponse` for callers that want
//! them, and keep unknown fields in `extra` so new service attributes are
//! never dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Request payload: field name to arbitrary JSON value.
pub type Payload = Map<String, Value>;

/// Build a [`Payload`] from a JSON object literal. Non-object values yield an
/// empty payload.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Successful outcome of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed DTO.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone()).map_err(|e| ApiError::MalformedResponse {
            status: self.status,
            message: format!("unexpected response shape: {e}"),
            body: self.body.to_string(),
        })
    }
}

/// A cash register as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashRegister {
    #[serde(rename = "_id")]
    pub id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signature creation unit as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureCreationUnit {
    #[serde(rename = "_id")]
    pub id: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_entity_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signed receipt. `qr_code_data` is what ends up in the printed RKSV QR
/// code; `receipt_number`, `time_signature` and
/// `cash_register_serial_number` are printed as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_register_serial_number: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_from_object() {
        let p = payload(json!({"state": "INITIALIZED"}));
        assert_eq!(p.get("state"), Some(&json!("INITIALIZED")));
    }

    #[test]
    fn payload_from_non_object_is_empty() {
        assert!(payload(json!([1, 2])).is_empty());
    }

    #[test]
    fn typed_view_keeps_unknown_fields() {
        let response = ApiResponse {
            status: 200,
            body: json!({"_id": "cr-1", "state": "CREATED", "serial_number": "KS-1"}),
        };
        let register: CashRegister = response.json().unwrap();
        assert_eq!(register.id, "cr-1");
        assert_eq!(register.state, "CREATED");
        assert_eq!(register.extra.get("serial_number"), Some(&json!("KS-1")));
    }

    #[test]
    fn typed_view_of_wrong_shape_is_malformed() {
        let response = ApiResponse {
            status: 200,
            body: json!({"state": 7}),
        };
        let err = response.json::<CashRegister>().unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { status: 200, .. }));
    }
}
