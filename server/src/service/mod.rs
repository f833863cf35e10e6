//! Admin HTTP surface
//!
//! - `endpoints::health`: liveness plus the active data backend
//! - `endpoints::migration`: migration status and step triggers, behind a bearer token
//! - `error`: JSON error responses

pub mod endpoints;
pub mod error;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::migration::Migrator;
use crate::persistence::Repository;

/// Shared state for every request.
#[derive(Debug)]
pub struct AppState {
    pub migrator: Migrator,
    /// Data access for the backend chosen at startup.
    pub repository: Repository,
    pub admin_token: Option<String>,
    /// Held for the duration of a migration step so steps never overlap.
    pub migration_lock: Mutex<()>,
}

impl AppState {
    pub fn new(migrator: Migrator, repository: Repository, admin_token: Option<String>) -> Self {
        Self {
            migrator,
            repository,
            admin_token: admin_token.filter(|t| !t.is_empty()),
            migration_lock: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/status", get(endpoints::migration::status))
        .route("/:step", post(endpoints::migration::run))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            endpoints::migration::require_admin,
        ));

    Router::new()
        .route("/health", get(endpoints::health::health))
        .nest("/api/migration", admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
