//! Row models and DTOs.

pub mod song;
pub mod video_project;
