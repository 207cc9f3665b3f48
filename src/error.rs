use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Only raised by the account layer; request dedup merges instead.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Internal bookkeeping disagrees with itself. Always a bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Validation(_) => "BAD_REQUEST",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::InvariantViolation(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        Self::Persistence(format!("bson encode: {e}"))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            status: "error",
            code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
