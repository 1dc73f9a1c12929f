//! Song entity (read-only here; owned by the wider application).

use serde::Serialize;
use sqlx::FromRow;
use waveclip_core::types::{DbId, Timestamp};

/// A row from the `songs` table.
///
/// `audio_url` is either a remote `http(s)` URL or a server-relative
/// asset path (e.g. `/audio/s1.mp3`); the orchestrator resolves it
/// against the public asset root. Same rules for `cover_art_url`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Song {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub audio_url: String,
    pub cover_art_url: Option<String>,
    pub created_at: Timestamp,
}
