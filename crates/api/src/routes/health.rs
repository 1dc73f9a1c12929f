//! Liveness endpoint, mounted at the root (outside `/api/v1`).

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct Health {
    /// `ok`, or `degraded` when the process is up but the database
    /// cannot be reached.
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = match waveclip_db::health_check(&state.pool).await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            "down"
        }
    };

    Json(Health {
        status: if database == "up" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
