//! The JSON API surface: one POST route per ledger operation, every
//! response wrapped in the `{status, result}` / `{status, errors}` envelope.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ledgerprop_auth::{decode_claims, LedgerApiClaims};
use ledgerprop_core::{Contract, ContractId, Payload, TemplateId, TemplateModel};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{AllocationShape, Fault, SandboxConfig};
use crate::ledger::{Ledger, Outcome, Refused, BAD_REQUEST, INTERNAL, UNAUTHORIZED};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    template_id: TemplateId,
    payload: Payload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseRequest {
    template_id: TemplateId,
    contract_id: ContractId,
    choice: String,
    #[serde(default)]
    argument: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest {
    template_id: TemplateId,
    contract_id: ContractId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    template_ids: Vec<TemplateId>,
    #[serde(default)]
    query: Payload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocateRequest {
    identifier_hint: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Switches a test can flip while the server runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls {
    pub fault: Fault,
    pub allocation_shape: AllocationShape,
}

#[derive(Clone)]
pub struct SandboxState {
    pub cfg: Arc<SandboxConfig>,
    pub ledger: Arc<Mutex<Ledger>>,
    pub controls: Arc<Mutex<Controls>>,
}

pub fn build_state(cfg: SandboxConfig, models: Vec<TemplateModel>) -> SandboxState {
    let controls = Controls {
        fault: Fault::None,
        allocation_shape: cfg.allocation_shape,
    };
    SandboxState {
        ledger: Arc::new(Mutex::new(Ledger::new(cfg.participant.clone(), models))),
        controls: Arc::new(Mutex::new(controls)),
        cfg: Arc::new(cfg),
    }
}

pub fn router(state: SandboxState) -> Router {
    Router::new()
        .route("/v1/create", post(create))
        .route("/v1/exercise", post(exercise))
        .route("/v1/fetch", post(fetch))
        .route("/v1/query", post(query))
        .route("/v1/parties/allocate", post(allocate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    state: SandboxState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn create(State(state): State<SandboxState>, headers: HeaderMap, body: Bytes) -> Response {
    let outcome = authenticate(&state, &headers).and_then(|claims| {
        let req: CreateRequest = parse(&body)?;
        let contract = state
            .ledger
            .lock()
            .create(&claims, &req.template_id, req.payload)?;
        if minimal(&state) {
            return Ok(json!({ "contractId": contract.contract_id }));
        }
        to_result(&contract)
    });
    respond(&state, outcome)
}

async fn exercise(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let outcome = authenticate(&state, &headers).and_then(|claims| {
        let req: ExerciseRequest = parse(&body)?;
        let result = state.ledger.lock().exercise(
            &claims,
            &req.template_id,
            &req.contract_id,
            &req.choice,
            &req.argument,
        )?;
        Ok(json!({ "exerciseResult": result, "events": [] }))
    });
    respond(&state, outcome)
}

async fn fetch(State(state): State<SandboxState>, headers: HeaderMap, body: Bytes) -> Response {
    let outcome = authenticate(&state, &headers).and_then(|claims| {
        let req: FetchRequest = parse(&body)?;
        let found = state
            .ledger
            .lock()
            .fetch(&claims, &req.template_id, &req.contract_id);
        match found {
            Some(contract) if minimal(&state) => Ok(bare(&contract)),
            found => to_result(&found),
        }
    });
    respond(&state, outcome)
}

async fn query(State(state): State<SandboxState>, headers: HeaderMap, body: Bytes) -> Response {
    let outcome = authenticate(&state, &headers).and_then(|claims| {
        let req: QueryRequest = parse(&body)?;
        let found = state
            .ledger
            .lock()
            .query(&claims, &req.template_ids, &req.query);
        if minimal(&state) {
            return Ok(Value::Array(found.iter().map(bare).collect()));
        }
        to_result(&found)
    });
    respond(&state, outcome)
}

async fn allocate(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Controls {
        fault,
        allocation_shape,
    } = *state.controls.lock();
    let outcome = authenticate(&state, &headers).and_then(|claims| {
        let req: AllocateRequest = parse(&body)?;
        let party = state.ledger.lock().allocate(
            &claims,
            &req.identifier_hint,
            fault == Fault::RepeatParty,
        )?;
        let display_name = req.display_name.unwrap_or_else(|| req.identifier_hint.clone());
        Ok(allocation_result(allocation_shape, &party, &display_name))
    });
    respond(&state, outcome)
}

fn allocation_result(shape: AllocationShape, party: &str, display_name: &str) -> Value {
    match shape {
        AllocationShape::Direct => {
            json!({ "party": party, "displayName": display_name, "isLocal": true })
        }
        AllocationShape::Nested => json!({
            "partyDetails": { "party": party, "displayName": display_name, "isLocal": true }
        }),
        AllocationShape::Identifier => {
            json!({ "identifier": party, "displayName": display_name })
        }
        AllocationShape::Unrecognized => json!({ "name": party }),
    }
}

fn minimal(state: &SandboxState) -> bool {
    state.controls.lock().fault == Fault::MinimalContracts
}

fn bare(contract: &Contract) -> Value {
    json!({ "contractId": contract.contract_id, "payload": contract.payload })
}

fn authenticate(state: &SandboxState, headers: &HeaderMap) -> Outcome<LedgerApiClaims> {
    let unauthorized = |detail: &str| {
        warn!(detail, "request refused");
        Refused::new(UNAUTHORIZED, detail)
    };
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(unauthorized("missing Authorization header"));
    };
    let raw = value
        .to_str()
        .map_err(|_| unauthorized("Authorization header is not ASCII"))?;
    let Some(token) = raw.strip_prefix("Bearer ") else {
        return Err(unauthorized("expected a Bearer token"));
    };
    let claims = decode_claims(token, state.cfg.hmac_secret.as_deref())
        .map_err(|err| unauthorized(&err.to_string()))?;
    if claims.ledger_id != state.cfg.ledger_id {
        return Err(unauthorized("token names another ledger"));
    }
    Ok(claims)
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Outcome<T> {
    serde_json::from_slice(body)
        .map_err(|err| Refused::new(BAD_REQUEST, format!("malformed request: {err}")))
}

fn to_result<T: Serialize>(value: &T) -> Outcome<Value> {
    serde_json::to_value(value).map_err(|err| Refused::new(INTERNAL, err.to_string()))
}

fn respond(state: &SandboxState, outcome: Outcome<Value>) -> Response {
    let fault = state.controls.lock().fault;
    match fault {
        Fault::Opaque => {
            return (StatusCode::BAD_GATEWAY, "upstream ledger unavailable").into_response();
        }
        Fault::MissingResult => {
            return (StatusCode::OK, Json(json!({ "status": 200 }))).into_response();
        }
        Fault::None | Fault::RepeatParty | Fault::MinimalContracts => {}
    }
    match outcome {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "status": 200, "result": result })),
        )
            .into_response(),
        Err(refused) => {
            let status =
                StatusCode::from_u16(refused.status).unwrap_or(StatusCode::BAD_REQUEST);
            (
                status,
                Json(json!({ "status": refused.status, "errors": [refused.message] })),
            )
                .into_response()
        }
    }
}
