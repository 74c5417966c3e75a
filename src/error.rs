//! Service error taxonomy and its HTTP mapping.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::domain::InvalidRequestError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Schema or semantic violation in the request; no solve is attempted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal solver fault (e.g. the solve task panicked).
    #[error("Solver error: {0}")]
    Solver(String),
}

impl From<InvalidRequestError> for AppError {
    fn from(err: InvalidRequestError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Solver(msg) => {
                tracing::error!("solver fault: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
