use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{CanonicalRequest, RequestContent, RequestId, SubscriberId, UserRequest},
    services::UpstreamQueries,
    AppState,
};

// GET /users/:user_id/requests
pub async fn get_user_requests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<UserRequest>>> {
    let id = SubscriberId(user_id);
    if state.users.get_user(id).await.is_none() {
        return Err(AppError::NotFound(format!("user {user_id}")));
    }
    let held = state
        .requests
        .get_requests_for_subscriber(id)
        .await
        .unwrap_or_default();
    Ok(Json(held))
}

// POST /users/:user_id/requests
pub async fn post_user_request(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(content): Json<RequestContent>,
) -> AppResult<impl IntoResponse> {
    let request = state.users.subscribe(SubscriberId(user_id), content).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

// DELETE /users/:user_id/requests/:request_id
pub async fn delete_user_request(
    State(state): State<AppState>,
    Path((user_id, request_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let (subscriber, id) = (SubscriberId(user_id), RequestId(request_id));
    if state.requests.get_user_request(subscriber, id).await.is_none() {
        return Err(AppError::NotFound(format!(
            "request {request_id} for user {user_id}"
        )));
    }
    state.requests.unsubscribe(subscriber, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /subscriptions
pub async fn get_subscriptions(State(state): State<AppState>) -> Json<Vec<Value>> {
    let all = state.requests.get_all_requests().await;
    Json(
        all.into_iter()
            .map(|(user_id, requests)| json!({ "user_id": user_id, "requests": requests }))
            .collect(),
    )
}

// GET /requests
pub async fn get_all_requests(State(state): State<AppState>) -> Json<Vec<CanonicalRequest>> {
    Json(state.requests.get_all_canonical_requests().await)
}

// GET /requests/:request_id
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> AppResult<Json<CanonicalRequest>> {
    state
        .requests
        .lookup_by_id(RequestId(request_id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id}")))
}

// GET /requests/:request_id/users
pub async fn get_request_users(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let members = state
        .requests
        .get_subscribers_for_request(RequestId(request_id))
        .await
        .ok_or_else(|| AppError::NotFound(format!("request {request_id}")))?;
    Ok(Json(json!({ "request_id": request_id, "users": members })))
}

// GET /server-queries
pub async fn get_server_queries(State(state): State<AppState>) -> Json<UpstreamQueries> {
    Json(state.requests.get_upstream_queries().await)
}

// POST /admin/reload
pub async fn post_reload(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let users = state.users.reload().await?;
    let canonical = state.requests.reload().await?;
    state.requests.verify().await?;
    Ok(Json(json!({ "users": users, "canonical_requests": canonical })))
}
