use std::sync::Arc;

use crate::config::{MediaConfig, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: waveclip_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Media roots and encoder binaries for the render pipeline.
    pub media: Arc<MediaConfig>,
    /// HTTP client for remote audio downloads.
    pub http: reqwest::Client,
}
