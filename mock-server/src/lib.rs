//! In-memory stand-in for the fiskaly SIGN AT API.
//!
//! Implements just enough of the cash register, SCU, receipt, and FON
//! lifecycle to exercise a client end to end: bearer-token checks, 404 for
//! unknown resources, 409 for conflicting state transitions, idempotent
//! receipt signing, and an optional FinanzOnline outage that turns FON calls
//! into 503s.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::put,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

pub const CASH_REGISTER_STATES: &[&str] = &[
    "REGISTERED",
    "INITIALIZED",
    "DECOMMISSIONED",
    "DEFECTIVE",
    "OUTAGE",
];
pub const SCU_STATES: &[&str] = &["INITIALIZED", "DECOMMISSIONED"];
pub const RECEIPT_TYPES: &[&str] = &["NORMAL", "CANCELLATION", "TRAINING"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CashRegister {
    #[serde(rename = "_id")]
    pub id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub serial_number: String,
    #[serde(skip)]
    pub receipt_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignatureCreationUnit {
    #[serde(rename = "_id")]
    pub id: String,
    pub state: String,
    pub legal_entity_id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    #[serde(rename = "_id")]
    pub id: String,
    pub cash_register_id: String,
    pub receipt_type: String,
    pub receipt_number: u64,
    pub qr_code_data: String,
    pub time_signature: String,
    pub cash_register_serial_number: String,
    pub schema: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FonAuth {
    pub fon_participant_id: String,
    pub fon_user_id: String,
    pub authenticated: bool,
}

#[derive(Debug, Default)]
pub struct Store {
    cash_registers: HashMap<String, CashRegister>,
    scus: HashMap<String, SignatureCreationUnit>,
    receipts: HashMap<(String, String), Receipt>,
    fon: Option<FonAuth>,
}

#[derive(Clone, Default)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    fon_outage: bool,
}

/// Error body in the service's `{status_code, code, message}` shape.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_VALIDATION", message)
    }

    fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "E_NOT_FOUND", format!("{what} {id} not found"))
    }

    fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "status_code": self.status.as_u16(),
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    router(AppState::default())
}

/// Router whose FinanzOnline integration is down: `PUT /fon/auth` answers
/// 503.
pub fn app_with_fon_outage() -> Router {
    router(AppState {
        fon_outage: true,
        ..AppState::default()
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/cash-register/{id}",
            put(create_cash_register).patch(update_cash_register),
        )
        .route("/cash-register/{id}/receipt/{receipt_id}", put(sign_receipt))
        .route(
            "/signature-creation-unit/{id}",
            put(create_scu).patch(update_scu),
        )
        .route("/fon/auth", put(authenticate_fon))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

/// Serve an already built router, e.g. [`app_with_fon_outage`].
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiFailure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "E_UNAUTHORIZED",
            "missing or malformed bearer token",
        ));
    }
    Ok(())
}

fn string_field<'a>(body: &'a Value, name: &str) -> Option<&'a str> {
    body.get(name).and_then(Value::as_str)
}

fn required_state<'a>(body: &'a Value, allowed: &[&str]) -> Result<&'a str, ApiFailure> {
    let state = string_field(body, "state")
        .ok_or_else(|| ApiFailure::bad_request("`state` is required"))?;
    if !allowed.contains(&state) {
        return Err(ApiFailure::bad_request(format!("unknown state {state}")));
    }
    Ok(state)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

async fn create_cash_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CashRegister>, ApiFailure> {
    authorize(&headers)?;
    let mut store = state.store.write().await;
    if store.cash_registers.contains_key(&id) {
        return Err(ApiFailure::conflict(
            "E_CASH_REGISTER_CONFLICT",
            format!("cash register {id} already exists"),
        ));
    }
    let register = CashRegister {
        id: id.clone(),
        state: "CREATED".to_string(),
        description: string_field(&body, "description").map(str::to_string),
        metadata: body.get("metadata").cloned(),
        serial_number: format!("KS-{:06}", store.cash_registers.len() + 1),
        receipt_count: 0,
    };
    store.cash_registers.insert(id.clone(), register.clone());
    info!(%id, "cash register created");
    Ok(Json(register))
}

async fn update_cash_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CashRegister>, ApiFailure> {
    authorize(&headers)?;
    let target = required_state(&body, CASH_REGISTER_STATES)?;
    let mut store = state.store.write().await;
    let fon_ready = store.fon.as_ref().is_some_and(|fon| fon.authenticated);
    let register = store
        .cash_registers
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::not_found("cash register", &id))?;

    if register.state == target {
        return Err(ApiFailure::conflict(
            "E_CASH_REGISTER_CONFLICT",
            format!("cash register {id} is already {target}"),
        ));
    }
    if target == "INITIALIZED" && !fon_ready {
        return Err(ApiFailure::conflict(
            "E_FON_NOT_AUTHENTICATED",
            "authenticate with FinanzOnline before initializing",
        ));
    }

    register.state = target.to_string();
    if let Some(description) = string_field(&body, "description") {
        register.description = Some(description.to_string());
    }
    if let Some(metadata) = body.get("metadata") {
        register.metadata = Some(metadata.clone());
    }
    info!(%id, state = target, "cash register updated");
    Ok(Json(register.clone()))
}

async fn sign_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((cash_register_id, receipt_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Receipt>, ApiFailure> {
    authorize(&headers)?;
    let mut store = state.store.write().await;
    let key = (cash_register_id.clone(), receipt_id.clone());

    if !store.cash_registers.contains_key(&cash_register_id) {
        return Err(ApiFailure::not_found("cash register", &cash_register_id));
    }
    if let Some(existing) = store.receipts.get(&key) {
        return Ok(Json(existing.clone()));
    }

    let receipt_type = string_field(&body, "receipt_type")
        .filter(|t| RECEIPT_TYPES.contains(t))
        .ok_or_else(|| {
            ApiFailure::bad_request("`receipt_type` must be NORMAL, CANCELLATION or TRAINING")
        })?
        .to_string();
    let schema = body
        .get("schema")
        .filter(|schema| schema.get("standard_v1").is_some_and(Value::is_object))
        .cloned()
        .ok_or_else(|| ApiFailure::bad_request("`schema.standard_v1` is required"))?;

    let register = store
        .cash_registers
        .get_mut(&cash_register_id)
        .ok_or_else(|| ApiFailure::not_found("cash register", &cash_register_id))?;
    if register.state != "INITIALIZED" {
        return Err(ApiFailure::conflict(
            "E_CASH_REGISTER_NOT_INITIALIZED",
            format!("cash register {cash_register_id} is {}", register.state),
        ));
    }

    register.receipt_count += 1;
    let signed_at = unix_seconds();
    let receipt = Receipt {
        id: receipt_id.clone(),
        cash_register_id: cash_register_id.clone(),
        receipt_type,
        receipt_number: register.receipt_count,
        qr_code_data: format!(
            "_R1-AT1_{}_{}_{}",
            register.serial_number, register.receipt_count, signed_at
        ),
        time_signature: signed_at.to_string(),
        cash_register_serial_number: register.serial_number.clone(),
        schema,
    };
    store.receipts.insert(key, receipt.clone());
    info!(%cash_register_id, %receipt_id, number = receipt.receipt_number, "receipt signed");
    Ok(Json(receipt))
}

async fn create_scu(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<SignatureCreationUnit>, ApiFailure> {
    authorize(&headers)?;
    let legal_entity_id = body
        .get("legal_entity_id")
        .filter(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| ApiFailure::bad_request("`legal_entity_id` is required"))?;

    let mut store = state.store.write().await;
    if store.scus.contains_key(&id) {
        return Err(ApiFailure::conflict(
            "E_SCU_CONFLICT",
            format!("signature creation unit {id} already exists"),
        ));
    }
    let scu = SignatureCreationUnit {
        id: id.clone(),
        state: "CREATED".to_string(),
        legal_entity_id,
        legal_entity_name: string_field(&body, "legal_entity_name").map(str::to_string),
        metadata: body.get("metadata").cloned(),
    };
    store.scus.insert(id.clone(), scu.clone());
    info!(%id, "signature creation unit created");
    Ok(Json(scu))
}

async fn update_scu(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<SignatureCreationUnit>, ApiFailure> {
    authorize(&headers)?;
    let target = required_state(&body, SCU_STATES)?;
    let mut store = state.store.write().await;
    let fon_ready = store.fon.as_ref().is_some_and(|fon| fon.authenticated);
    let scu = store
        .scus
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::not_found("signature creation unit", &id))?;

    if scu.state == target {
        return Err(ApiFailure::conflict(
            "E_SCU_CONFLICT",
            format!("signature creation unit {id} is already {target}"),
        ));
    }
    if target == "INITIALIZED" && !fon_ready {
        return Err(ApiFailure::conflict(
            "E_FON_NOT_AUTHENTICATED",
            "authenticate with FinanzOnline before initializing",
        ));
    }

    scu.state = target.to_string();
    if let Some(metadata) = body.get("metadata") {
        scu.metadata = Some(metadata.clone());
    }
    info!(%id, state = target, "signature creation unit updated");
    Ok(Json(scu.clone()))
}

async fn authenticate_fon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<FonAuth>, ApiFailure> {
    authorize(&headers)?;
    if state.fon_outage {
        return Err(ApiFailure::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "E_FON_UNAVAILABLE",
            "FinanzOnline is currently unavailable",
        ));
    }

    let field = |name: &str| {
        string_field(&body, name)
            .map(str::to_string)
            .ok_or_else(|| ApiFailure::bad_request(format!("`{name}` is required")))
    };
    let fon_participant_id = field("fon_participant_id")?;
    let fon_user_id = field("fon_user_id")?;
    field("fon_user_pin")?;

    let auth = FonAuth {
        fon_participant_id,
        fon_user_id,
        authenticated: true,
    };
    state.store.write().await.fon = Some(auth.clone());
    info!(participant = %auth.fon_participant_id, "FON authenticated");
    Ok(Json(auth))
}
