//! HTTP surface: upload, result retrieval and health.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bargedoc_extract::store::ResultRecord;

use crate::errors::ServerError;
use crate::gateway::{GatewayError, Submission, SubmissionGateway, SubmissionResponse};

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    /// The submission gateway.
    pub gateway: Arc<SubmissionGateway>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upload(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self {
            Self::InvalidInput(message) => message.clone(),
            Self::NotFound(_) => "Result not found".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Builds the router with CORS, request tracing and the upload size limit.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/result/:id", get(result))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmissionResponse>, GatewayError> {
    let mut submission = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidInput(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
        submission = Some(Submission {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let submission = submission
        .ok_or_else(|| GatewayError::InvalidInput("multipart field 'file' is required".to_string()))?;
    let response = state.gateway.submit(submission).await?;
    Ok(Json(response))
}

async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResultRecord>, GatewayError> {
    state.gateway.result(&id).await.map(Json)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(
    addr: SocketAddr,
    gateway: Arc<SubmissionGateway>,
    max_upload_bytes: usize,
) -> Result<(), ServerError> {
    let app = router(AppState { gateway }, max_upload_bytes);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(event = "server_listening", addr = %listener.local_addr()?, "server_listening");
    axum::serve(listener, app).await?;
    Ok(())
}
