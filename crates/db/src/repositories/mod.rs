//! Repository layer. One unit struct per table, static async methods.

mod song_repo;
mod video_project_repo;

pub use song_repo::SongRepo;
pub use video_project_repo::{VideoProjectRepo, MAX_ERROR_LEN};
