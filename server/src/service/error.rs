use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::migration::MigrationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid admin token")]
    Unauthorized,
    #[error("unknown migration step {0:?}")]
    UnknownStep(String),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::UnknownStep(_) => StatusCode::NOT_FOUND,
            ApiError::Migration(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Unauthorized",
            ApiError::UnknownStep(_) => "Not found",
            ApiError::Migration(e) if e.is_unavailable() => "Backend not available",
            ApiError::Migration(_) => "Migration failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Migration request failed");
        }
        let body = json!({
            "error": self.summary(),
            "details": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
