//! Core render-pipeline building blocks for waveclip.
//!
//! This crate holds the leaf components of the video render pipeline:
//! the external encoder runner, the media prober, diagnostic-progress
//! parsing, the visual configuration model, and the encoder command
//! builder. Everything here is either a pure function or a thin wrapper
//! around `tokio::process`; no internal crate dependencies.

pub mod command;
pub mod encoder;
pub mod probe;
pub mod progress;
pub mod types;
pub mod visual;
