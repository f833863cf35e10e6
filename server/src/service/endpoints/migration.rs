use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::Value;

use crate::migration::{MigrationStatus, MigrationTarget};
use crate::service::{error::ApiError, AppState};

/// Reject requests without `Authorization: Bearer <admin token>`.
/// With no token configured every request is rejected.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected) {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<MigrationStatus> {
    Json(state.migrator.status().await)
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    Path(step): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let target: MigrationTarget = step.parse().map_err(|_| ApiError::UnknownStep(step.clone()))?;

    let _guard = state.migration_lock.lock().await;
    tracing::info!(step = %step, "Migration requested");
    let report = state.migrator.run_step(target).await?;
    Ok(Json(report))
}
