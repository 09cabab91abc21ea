//! HTTP API
//!
//! Thin axum layer over `RecordStore` and `Reconciler`. Handlers translate
//! requests into store calls and library errors into status codes; they
//! hold no state of their own.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use enumbers_core::{
    Error, ProductRefreshReport, ReconcileReport, Reconciler, Record, RecordStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Record collection behind the CRUD routes
    pub store: Arc<RecordStore>,
    /// Runs catalog reconciliation and product refresh over the same store
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// State sharing the reconciler's store
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            store: Arc::clone(reconciler.store()),
            reconciler,
        }
    }
}

/// Build the API router
///
/// The action routes `/api/enumbers/reconcile` and
/// `/api/enumbers/refresh-products` are literal paths and take priority over
/// `/api/enumbers/{code}`. Stored codes are uppercase alphanumerics, so a
/// record is always reachable through its stored code (`RECONCILE`), while
/// the lowercase action path never names a record.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/enumbers", get(list_enumbers).post(create_enumber))
        .route("/api/enumbers/reconcile", post(reconcile))
        .route("/api/enumbers/refresh-products", post(refresh_products))
        .route(
            "/api/enumbers/{code}",
            put(update_enumber).delete(delete_enumber),
        )
        .with_state(state)
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be used
    BadRequest(String),
    /// Library error
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Core(Error::Validation(message)) => (StatusCode::BAD_REQUEST, message),
            ApiError::Core(Error::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "E-number not found".to_string())
            }
            ApiError::Core(Error::DuplicateCode(_)) => {
                (StatusCode::CONFLICT, "E-number already exists".to_string())
            }
            ApiError::Core(e) => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Query string of `GET /api/enumbers`
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Case-insensitive substring of code or name; blank lists everything
    q: Option<String>,
}

/// Body of `POST /api/enumbers`
///
/// Both fields are required. A missing one is answered with
/// 400 `Missing code or name`.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Raw code, sanitized by the store
    code: Option<String>,
    /// Raw display name, sanitized by the store
    name: Option<String>,
}

/// Body of `PUT /api/enumbers/{code}`
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Replacement display name (required)
    name: Option<String>,
}

/// Body of a successful create/update/delete
#[derive(Debug, Serialize)]
struct MutationResponse {
    message: &'static str,
    enumber: Record,
}

async fn list_enumbers(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Record>> {
    Json(state.store.list(params.q.as_deref()).await)
}

async fn create_enumber(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MutationResponse>)> {
    let Json(request) = body?;
    let (Some(code), Some(name)) = (request.code, request.name) else {
        return Err(ApiError::BadRequest("Missing code or name".to_string()));
    };

    let enumber = state.store.create(&code, &name).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            message: "Created",
            enumber,
        }),
    ))
}

async fn update_enumber(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: std::result::Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Json<MutationResponse>> {
    let Json(request) = body?;
    let Some(name) = request.name else {
        return Err(ApiError::BadRequest("Missing name".to_string()));
    };

    let enumber = state.store.update(&code, &name).await?;
    Ok(Json(MutationResponse {
        message: "Updated",
        enumber,
    }))
}

async fn delete_enumber(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<MutationResponse>> {
    let enumber = state.store.delete(&code).await?;
    Ok(Json(MutationResponse {
        message: "Deleted",
        enumber,
    }))
}

async fn reconcile(State(state): State<AppState>) -> ApiResult<Json<ReconcileReport>> {
    Ok(Json(state.reconciler.reconcile().await?))
}

async fn refresh_products(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = state.reconciler.refresh_product_details().await?;
    Ok(Json(refresh_body(&report)))
}

fn refresh_body(report: &ProductRefreshReport) -> Value {
    let results: Vec<Value> = report
        .lookups
        .iter()
        .map(|lookup| match &lookup.outcome {
            Ok(outcome) => json!({ "code": lookup.code, "outcome": outcome }),
            Err(e) => json!({ "code": lookup.code, "outcome": "failed", "error": e.to_string() }),
        })
        .collect();

    json!({
        "attached": report.attached(),
        "notFound": report.not_found(),
        "failed": report.failed(),
        "results": results,
    })
}
