use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::finder::models::FinderResponse;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant answers with an empty recommendation list; details stay in the server log.
/// Upstream failures never become an `AppError`: the finder degrades to its fallback instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("OPENAI_API_KEY is not configured")]
    ConfigurationMissing,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigurationMissing | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::BadRequest(msg) => tracing::warn!("Rejected request: {msg}"),
            AppError::ConfigurationMissing => tracing::error!("{self}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e:?}"),
        }

        (self.status(), Json(FinderResponse::empty())).into_response()
    }
}
