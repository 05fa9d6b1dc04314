//! Router definition for the host.

use crate::server::{handlers, state::HostState};
use axum::{routing::get, Router};

/// Build the two-endpoint router over one hosted archive.
pub fn create_host_router(state: &HostState) -> Router {
    Router::new()
        .route("/", get(handlers::probe_handler))
        .route("/get", get(handlers::fetch_handler))
        .with_state(state.clone())
}
