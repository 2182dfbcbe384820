//! HTTP routes of the relay.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use woven_custody::access::{
    AccessRequest, AccessRequestMachine, ApproveAccessRequest, CreateAccessRequest, RequestError,
    RequestId,
};

use crate::auth::{Caller, TokenDirectory};

#[derive(Clone)]
pub struct RelayState {
    pub machine: Arc<AccessRequestMachine>,
    pub tokens: Arc<TokenDirectory>,
}

impl RelayState {
    pub fn new(machine: Arc<AccessRequestMachine>, tokens: TokenDirectory) -> Self {
        Self {
            machine,
            tokens: Arc::new(tokens),
        }
    }
}

/// Failure of a relay call, rendered as `{code, message}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    Request(RequestError),
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn status_of(err: &RequestError) -> StatusCode {
    match err {
        RequestError::NotFound | RequestError::VaultNotFound => StatusCode::NOT_FOUND,
        RequestError::NotPending => StatusCode::CONFLICT,
        RequestError::Expired => StatusCode::GONE,
        RequestError::Forbidden => StatusCode::FORBIDDEN,
        RequestError::NotStrictVault | RequestError::NoPartner | RequestError::Invalid(_) => {
            StatusCode::BAD_REQUEST
        }
        RequestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or unknown bearer token".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
            ApiError::Request(err) => {
                let status = status_of(&err);
                if status.is_server_error() {
                    error!("Access request storage failure: {}", err);
                }
                (status, err.code(), err.to_string())
            }
        };

        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/access-requests", post(create_request))
        .route("/access-requests/{id}", get(get_request))
        .route("/access-requests/{id}/approve", post(approve_request))
        .route("/access-requests/{id}/deny", post(deny_request))
        .route("/vaults/{vault_id}/access-requests", get(pending_requests))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_request(
    State(state): State<RelayState>,
    Caller(caller): Caller,
    body: Result<Json<CreateAccessRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AccessRequest>)> {
    let Json(body) = body?;
    let request = state
        .machine
        .create_for_partner(body.vault_id, caller, body.requester_public_key)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn get_request(
    State(state): State<RelayState>,
    Caller(caller): Caller,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<AccessRequest>> {
    Ok(Json(state.machine.get_as(id, caller).await?))
}

async fn approve_request(
    State(state): State<RelayState>,
    Caller(caller): Caller,
    Path(id): Path<RequestId>,
    body: Result<Json<ApproveAccessRequest>, JsonRejection>,
) -> ApiResult<Json<AccessRequest>> {
    let Json(body) = body.inspect_err(|e| warn!("Rejected approval body: {}", e))?;
    Ok(Json(
        state
            .machine
            .approve(id, caller, body.encrypted_share)
            .await?,
    ))
}

async fn deny_request(
    State(state): State<RelayState>,
    Caller(caller): Caller,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<AccessRequest>> {
    Ok(Json(state.machine.deny(id, caller).await?))
}

async fn pending_requests(
    State(state): State<RelayState>,
    Caller(caller): Caller,
    Path(vault_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AccessRequest>>> {
    Ok(Json(state.machine.pending_for_vault(vault_id, caller).await?))
}
