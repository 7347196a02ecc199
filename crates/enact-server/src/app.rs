//! HTTP application wiring (Axum router + shared state).

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use enact_core::app::Submitter;
use enact_core::ports::{IdGenerator, StatusStore};

use crate::routes;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub submitter: Submitter,
    pub store: Arc<dyn StatusStore>,
    pub ids: Arc<dyn IdGenerator>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", post(routes::submit_task))
        .route("/tasks", post(routes::submit_task))
        .route("/tasks/:id", get(routes::get_status))
        .route("/healthz", get(routes::healthz))
        .with_state(state)
}
