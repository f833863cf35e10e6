use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::persistence::BackendKind;
use crate::service::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    backend: BackendKind,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        backend: state.repository.kind(),
    })
}
