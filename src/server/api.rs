use axum::{
  extract::{
    rejection::{JsonRejection, QueryRejection},
    Path, Query, State,
  },
  http::{header, HeaderValue, Method, StatusCode},
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::db::{DocumentStore, SqlDialect};
use crate::service::{ListParams, NoteService, ServiceError};
use crate::types::{CreateNote, ListNoteResponse, NoteResponse, UpdateNote};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
  pub service: Arc<NoteService>,
  pub store: Arc<dyn DocumentStore>,
  pub start_time: Instant,
}

impl AppState {
  pub fn new(service: Arc<NoteService>, store: Arc<dyn DocumentStore>) -> Self {
    Self {
      service,
      store,
      start_time: Instant::now(),
    }
  }
}

/// Note routes plus the health probes. Layers are added by the caller.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(health_check))
    .route("/ready", get(readiness_check))
    .route("/api/status", get(api_status))
    .route("/api/healthchecker", get(healthchecker))
    .route("/api/notes", get(list_notes).post(create_note))
    .route("/api/notes/", get(list_notes).post(create_note))
    .route(
      "/api/notes/{id}",
      get(get_note).patch(update_note).delete(delete_note),
    )
    .with_state(state)
}

/// CORS from the configured origins; empty or `*` means permissive.
///
/// Listed origins may send credentials, which rules out wildcard methods and
/// headers.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
  if origins.is_empty() || origins.iter().any(|o| o == "*") {
    return CorsLayer::permissive();
  }
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match o.parse() {
      Ok(v) => Some(v),
      Err(_) => {
        tracing::warn!("Ignoring invalid CORS origin: {:?}", o);
        None
      }
    })
    .collect();
  CorsLayer::new()
    .allow_origin(origins)
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::PATCH,
      Method::DELETE,
      Method::OPTIONS,
    ])
    .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
    .allow_credentials(true)
}

#[derive(Serialize)]
struct StatusResponse {
  name: &'static str,
  version: &'static str,
  backend: String,
  uptime_secs: u64,
}

async fn api_status(State(state): State<AppState>) -> Json<StatusResponse> {
  let backend = match state.store.dialect() {
    SqlDialect::Postgres => "postgres",
    SqlDialect::Sqlite => "sqlite",
  };
  Json(StatusResponse {
    name: "Acorn Notes",
    version: env!("CARGO_PKG_VERSION"),
    backend: backend.into(),
    uptime_secs: state.start_time.elapsed().as_secs(),
  })
}

/// Liveness probe - returns 200 if server is running
async fn health_check() -> StatusCode {
  StatusCode::OK
}

/// Readiness probe - returns 200 if the store answers
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
  match state.store.ping().await {
    Ok(()) => StatusCode::OK,
    Err(e) => {
      tracing::warn!("Readiness check failed: {}", e);
      StatusCode::SERVICE_UNAVAILABLE
    }
  }
}

async fn healthchecker() -> Json<serde_json::Value> {
  Json(serde_json::json!({ "message": "Welcome to Acorn Notes" }))
}

async fn list_notes(
  State(state): State<AppState>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListNoteResponse>, AppError> {
  let Query(params) = params?;
  Ok(Json(state.service.list(&params).await?))
}

async fn create_note(
  State(state): State<AppState>,
  payload: Result<Json<CreateNote>, JsonRejection>,
) -> Result<(StatusCode, Json<NoteResponse>), AppError> {
  let Json(payload) = payload?;
  let created = state.service.create(payload).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

async fn get_note(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<NoteResponse>, AppError> {
  Ok(Json(state.service.get_by_id(&id).await?))
}

async fn update_note(
  State(state): State<AppState>,
  Path(id): Path<String>,
  payload: Result<Json<UpdateNote>, JsonRejection>,
) -> Result<Json<NoteResponse>, AppError> {
  let Json(payload) = payload?;
  Ok(Json(state.service.update(&id, payload).await?))
}

async fn delete_note(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
  state.service.delete_by_id(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Failure of a note route, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum AppError {
  Service(ServiceError),
  /// Request rejected by an extractor before reaching the service
  Rejected(StatusCode, String),
}

impl From<ServiceError> for AppError {
  fn from(e: ServiceError) -> Self {
    Self::Service(e)
  }
}

/// Every unusable body is a 422, whether it is malformed, mistyped or sent
/// without a JSON content type.
impl From<JsonRejection> for AppError {
  fn from(e: JsonRejection) -> Self {
    Self::Rejected(StatusCode::UNPROCESSABLE_ENTITY, e.body_text())
  }
}

impl From<QueryRejection> for AppError {
  fn from(e: QueryRejection) -> Self {
    Self::Rejected(StatusCode::BAD_REQUEST, e.body_text())
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, detail) = match self {
      Self::Service(e) => {
        let status = match &e {
          ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
          ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
          ServiceError::Conflict(_) => StatusCode::CONFLICT,
          ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
          ServiceError::Internal(inner) => {
            tracing::error!("Note request failed: {}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
          }
        };
        (status, e.to_string())
      }
      Self::Rejected(status, detail) => (status, detail),
    };
    (status, Json(serde_json::json!({ "detail": detail }))).into_response()
  }
}
