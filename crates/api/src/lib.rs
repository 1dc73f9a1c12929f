//! HTTP surface and render orchestration for waveclip.
//!
//! The library exposes [`router::build_app_router`] so the production
//! binary and integration tests share the exact same middleware stack.

pub mod config;
pub mod error;
pub mod handlers;
pub mod render;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
