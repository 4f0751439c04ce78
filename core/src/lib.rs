//! Client core for the fiskaly SIGN AT (RKSV) API.
//!
//! # Overview
//! Every SIGN AT action (creating a cash register, moving an SCU to
//! `INITIALIZED`, signing a receipt, authenticating with FinanzOnline) is the
//! same round trip: check the payload against the endpoint's rules, build an
//! authenticated JSON `PUT`/`PATCH`, send it, and classify the answer. This
//! crate implements that round trip once and describes the endpoints as data.
//!
//! # Design
//! - `Endpoint` (method, path template, `RuleSet`) is static data; the catalog
//!   lives in `endpoints`. There is one `Operation` type for all of them.
//! - Validation runs before any request is built, so a bad payload never
//!   costs a network call.
//! - Building (`Operation::prepare`) and classifying (`handle_response`) are
//!   pure. `SignAtClient` glues them to a `Transport`, adding the timeout and
//!   caller cancellation; hosts that do their own I/O can skip it.
//! - Configuration is an explicit `ClientConfig`, read from the environment
//!   once by `ClientConfig::from_env` if the caller wants that.
//! - All failures are one `ApiError` enum; `ApiError::kind` and
//!   `ApiError::is_retryable` let callers branch without string matching.
//!
//! ```rust
//! use sign_at_core::{cash_registers, payload, ClientConfig, HttpMethod};
//! use serde_json::json;
//!
//! let config = ClientConfig::new("https://rksv.fiskaly.com/api/v1").unwrap();
//! let op = cash_registers::update("token", "abc-123", payload(json!({"state": "INITIALIZED"})));
//! let prepared = op.prepare(&config).unwrap();
//!
//! assert_eq!(prepared.request().method, HttpMethod::Patch);
//! assert_eq!(prepared.request().url, "https://rksv.fiskaly.com/api/v1/cash-register/abc-123");
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod mock;
pub mod operation;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;
pub mod validation;

pub use client::SignAtClient;
pub use config::{ClientConfig, ConfigError};
pub use endpoints::{cash_registers, fon, new_id, receipts, signature_creation_units};
pub use error::{ApiError, ApiResult, FailureKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mock::MockTransport;
pub use operation::{Endpoint, Operation, PreparedRequest, ValidatedOperation};
pub use request::RequestBuilder;
pub use response::handle_response;
pub use transport::{Transport, TransportError, TransportErrorKind, UreqTransport};
pub use types::{payload, ApiResponse, CashRegister, Payload, Receipt, SignatureCreationUnit};
pub use validation::{validate, Constraint, RuleSet, Shape, ShapeField, ValidationOptions};
