//! JSON REST endpoints over the same operations as `/rpc`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use piscola_core::messages::{ErrorPayload, ERROR_CODE_BAD_REQUEST};
use piscola_core::{AdvancedQuery, Item, ItemId, Message, Query, SearchResult};
use serde_json::json;
use tracing::warn;

use super::{request_id, status_for_code, AppState};
use crate::service::{CallerOrigin, OperationError, OperationResponse};

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// JSON error body `{"code": n, "message": "..."}` with the matching status.
#[derive(Debug)]
pub struct ApiError(ErrorPayload);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(ErrorPayload::new(ERROR_CODE_BAD_REQUEST, message))
    }
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        Self(ErrorPayload::new(err.code(), err.to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !self.0.is_client_error() {
            warn!(code = self.0.code, message = %self.0.message, "request failed");
        }
        (status_for_code(self.0.code), Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn run(state: &AppState, headers: &HeaderMap, msg: Message) -> Result<OperationResponse, ApiError> {
    Ok(state
        .dispatch(msg, CallerOrigin::Rest, request_id(headers))
        .await?)
}

fn mismatch(resp: &OperationResponse) -> ApiError {
    OperationError::Internal(anyhow::anyhow!("unexpected response {resp:?}")).into()
}

async fn ack(state: &AppState, headers: &HeaderMap, msg: Message) -> ApiResult<serde_json::Value> {
    match run(state, headers, msg).await? {
        OperationResponse::Ack { success } => Ok(Json(json!({ "success": success }))),
        other => Err(mismatch(&other)),
    }
}

async fn search(state: &AppState, headers: &HeaderMap, msg: Message) -> ApiResult<SearchResult> {
    match run(state, headers, msg).await? {
        OperationResponse::Lookup(result) => Ok(Json(result)),
        other => Err(mismatch(&other)),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /items`
pub async fn add_item_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Item>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    let Json(item) = body?;
    ack(&state, &headers, Message::Add { item }).await
}

/// `PUT /items/{id}`. The path id replaces any id in the body.
pub async fn replace_item_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<ItemId>, PathRejection>,
    body: Result<Json<Item>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    let Path(id) = id?;
    let Json(mut item) = body?;
    item.id = id;
    ack(&state, &headers, Message::Replace { item }).await
}

/// `DELETE /items/{id}`
pub async fn remove_item_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<ItemId>, PathRejection>,
) -> ApiResult<serde_json::Value> {
    let Path(id) = id?;
    ack(&state, &headers, Message::Remove { id }).await
}

/// `GET /items/count`
pub async fn count_items_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    match run(&state, &headers, Message::Size).await? {
        OperationResponse::Size { size } => Ok(Json(json!({ "size": size }))),
        other => Err(mismatch(&other)),
    }
}

/// `POST /lookup`
pub async fn lookup_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Query>, JsonRejection>,
) -> ApiResult<SearchResult> {
    let Json(query) = body?;
    search(&state, &headers, Message::Lookup { query }).await
}

/// `POST /lookup/advanced`
pub async fn lookup_advanced_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AdvancedQuery>, JsonRejection>,
) -> ApiResult<SearchResult> {
    let Json(query) = body?;
    search(&state, &headers, Message::LookupAdvanced { query }).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
