//! The render orchestrator: end-to-end pipeline for one video render
//! job, run as a detached background task per request.
//!
//! Submission-time concerns (duplicate guard, encoder availability gate,
//! the transition to `rendering`) live in the HTTP handler so the
//! request can return a job handle immediately; everything from input
//! staging onward happens here, observable only through the project
//! state store.

pub mod pipeline;
pub mod stage;

pub use pipeline::RenderJob;

/// User-facing message recorded when the encoder binary is missing.
pub const ENCODER_INSTALL_HINT: &str =
    "Video encoder not available. Install ffmpeg and ensure it is on your PATH.";

/// Error type for the render pipeline.
///
/// Every variant is fatal for the job: the task's top level converts it
/// into a `mark_failed` transition, so no failure escapes unobserved.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("asset not found at {path}")]
    AssetNotFound { path: String },

    #[error("audio download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error(transparent)]
    Probe(#[from] waveclip_core::probe::ProbeError),

    #[error("encoder failed: {0}")]
    Encoder(#[from] waveclip_core::encoder::EncoderError),

    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
