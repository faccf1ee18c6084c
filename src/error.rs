use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::ErrorStatusMode;
use crate::store::StoreError;

/// Message returned when a single-record read does not match exactly one row.
pub const SINGLE_ROW_MISMATCH: &str = "JSON object requested, multiple (or no) rows returned";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidBody(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    DataStore(#[from] StoreError),
}

impl AppError {
    pub fn status(&self, mode: ErrorStatusMode) -> StatusCode {
        match (self, mode) {
            (AppError::MethodNotAllowed, _) => StatusCode::METHOD_NOT_ALLOWED,
            (_, ErrorStatusMode::Compat) => StatusCode::INTERNAL_SERVER_ERROR,
            (AppError::Unauthorized, ErrorStatusMode::Strict) => StatusCode::UNAUTHORIZED,
            (AppError::NotFound(_), ErrorStatusMode::Strict) => StatusCode::NOT_FOUND,
            (AppError::InvalidBody(_), ErrorStatusMode::Strict) => StatusCode::BAD_REQUEST,
            (AppError::DataStore(_), ErrorStatusMode::Strict) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as `{"error": <message>}` with the status the mode assigns.
    pub fn render(self, mode: ErrorStatusMode) -> Response {
        let status = self.status(mode);

        match &self {
            AppError::DataStore(e) => tracing::error!(error = %e, "Data store error"),
            other => tracing::warn!(error = %other, status = status.as_u16(), "Request failed"),
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
