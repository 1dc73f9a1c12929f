//! Route registration.

pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/render",
            post(handlers::render::submit_render).get(handlers::render::list_projects),
        )
        .route("/render/{project_id}", get(handlers::render::get_render_status))
        .route(
            "/render/{project_id}/progress",
            post(handlers::render::push_progress),
        )
}
