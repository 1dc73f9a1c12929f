//! Request handlers.

pub mod render;
