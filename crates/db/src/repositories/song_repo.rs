//! Read-only repository for the `songs` table.
//!
//! Song CRUD lives elsewhere in the application; the render service only
//! needs "fetch song by id" to resolve audio and cover-art sources.

use sqlx::SqlitePool;
use waveclip_core::types::DbId;

use crate::models::song::Song;

/// Column list for `songs` queries.
const COLUMNS: &str = "id, user_id, title, audio_url, cover_art_url, created_at";

pub struct SongRepo;

impl SongRepo {
    /// Find a song by its ID.
    pub async fn find_by_id(pool: &SqlitePool, id: &DbId) -> Result<Option<Song>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM songs WHERE id = $1");
        sqlx::query_as::<_, Song>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
