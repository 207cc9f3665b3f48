use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::error;

use crate::{
    error::{AppError, AppResult},
    models::{SubscriberId, User},
    services::UserUpdate,
    AppState,
};

#[derive(Deserialize)]
pub struct CreateUserForm {
    pub user_id: i64,
    pub firstname: String,
    pub surname: String,
    pub username: String,
}

// GET /users
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.users.list_users().await)
}

// GET /users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    state
        .users
        .get_user(SubscriberId(user_id))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
}

// POST /users
pub async fn post_user(
    State(state): State<AppState>,
    Json(form): Json<CreateUserForm>,
) -> AppResult<impl IntoResponse> {
    if form.username.trim().is_empty() {
        return Err(AppError::Validation("username must not be empty".into()));
    }

    let user = User::new(
        SubscriberId(form.user_id),
        form.firstname.trim(),
        form.surname.trim(),
        form.username.trim(),
    );
    let user = state.users.add_user(user).await.inspect_err(|e| {
        if !matches!(e, AppError::AlreadyExists(_)) {
            error!("add_user error: {e}");
        }
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

// PUT /users/:user_id
pub async fn put_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> AppResult<Json<User>> {
    let user = state.users.update_user(SubscriberId(user_id), update).await?;
    Ok(Json(user))
}

// DELETE /users/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<StatusCode> {
    state
        .users
        .delete_user(SubscriberId(user_id))
        .await
        .inspect_err(|e| {
            if !matches!(e, AppError::NotFound(_)) {
                error!("delete_user error: {e}");
            }
        })?;
    Ok(StatusCode::NO_CONTENT)
}
