use crate::auth::{AdminAuth, AuthError, Claims, IssuedToken};
use crate::config::Listener as ListenerConfig;
use crate::record::{RecordError, TrackingRecord};
use crate::service::{ServiceError, TrackingService};
use crate::store::StoreError;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::{StatusCode, header, request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    service: TrackingService,
    auth: Arc<AdminAuth>,
}

impl AppState {
    pub fn new(service: TrackingService, auth: AdminAuth) -> Self {
        AppState {
            service,
            auth: Arc::new(auth),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tracking", post(upsert))
        .route("/api/tracking/{id}", get(lookup).put(upsert_with_id))
        .route("/api/admin/login", post(login))
        .route("/api/admin/tracking", get(list))
        .route("/api/admin/tracking/{id}", get(admin_lookup).delete(delete))
        .with_state(state)
}

pub async fn serve(listener: &ListenerConfig, state: AppState) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let tcp = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Tracking API listening");

    axum::serve(tcp, router(state)).await
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

#[derive(Serialize)]
struct UpsertResponse {
    created: bool,
    record: TrackingRecord,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: TrackingRecord,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// A request that carried a valid admin bearer token.
pub struct AdminSession(pub Claims);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .ok_or(AuthError::MissingToken)?;

        state.auth.verify(token).map(AdminSession)
    }
}

async fn health() -> &'static str {
    "ok\n"
}

async fn lookup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrackingRecord>, ServiceError> {
    state.service.get(&id).await.map(Json)
}

async fn upsert(
    State(state): State<AppState>,
    Json(record): Json<TrackingRecord>,
) -> Result<Response, ServiceError> {
    let upserted = state.service.upsert(record).await?;
    let status = if upserted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    let body = Json(UpsertResponse {
        created: upserted.created,
        record: upserted.record,
    });
    Ok((status, body).into_response())
}

async fn upsert_with_id(
    state: State<AppState>,
    Path(id): Path<String>,
    Json(mut record): Json<TrackingRecord>,
) -> Result<Response, ServiceError> {
    let column = state.service.identifier_column().to_string();
    record.insert(column, Value::String(id));
    upsert(state, Json(record)).await
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AuthError> {
    state
        .auth
        .login(&request.username, &request.password)
        .map(Json)
}

async fn list(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<TrackingRecord>>, ServiceError> {
    state.service.list().await.map(Json)
}

async fn admin_lookup(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrackingRecord>, ServiceError> {
    state.service.get(&id).await.map(Json)
}

async fn delete(
    AdminSession(claims): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ServiceError> {
    let deleted = state.service.delete(&id).await?;
    tracing::info!(admin = %claims.sub, id = %id, "Admin deleted tracking record");
    Ok(Json(DeleteResponse { deleted }))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ApiErrorResponse { error_message: message })).into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::MissingIdentifier(_) => StatusCode::BAD_REQUEST,
            ServiceError::Record(RecordError::MissingIdentifierColumn(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Store(StoreError::RowOutOfRange(_)) => StatusCode::CONFLICT,
            ServiceError::Store(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Tracking request failed");
        }

        error_response(status, self.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Admin authentication rejected");
        error_response(StatusCode::UNAUTHORIZED, self.to_string())
    }
}
