use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::AppState;

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "code": "NOT_FOUND", "message": "no such route" })),
    )
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn health_db(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.requests.gateway().backend_name();
    match state.requests.gateway().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok", "backend": backend }))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "backend": backend, "message": e.to_string() })),
        )
            .into_response(),
    }
}
