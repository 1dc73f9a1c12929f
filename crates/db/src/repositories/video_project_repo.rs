//! Repository for the `video_projects` table -- the project state store.
//!
//! This is the only mutator of render-job state. Every transition is a
//! single atomic UPDATE and bumps `updated_at` as a side effect.
//!
//! `update_progress` clamps its input to [0, 100] but does not enforce
//! monotonicity; the orchestrator is the sole caller while a job is in
//! flight and never reports a lower value after a higher one.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use waveclip_core::types::DbId;

use crate::models::video_project::{
    ProjectListQuery, ProjectState, RenderStage, SubmitRender, VideoProject,
};

/// Column list for `video_projects` queries.
const COLUMNS: &str = "\
    id, song_id, user_id, state, stage, progress, job_handle, \
    visual_config, output_path, error_message, \
    created_at, updated_at, completed_at";

/// Storage cap for `error_message`. Encoder diagnostics can run to
/// megabytes; anything past this is noise in a status row.
pub const MAX_ERROR_LEN: usize = 500;

/// Maximum page size for project listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for project listing.
const DEFAULT_LIMIT: i64 = 50;

pub struct VideoProjectRepo;

impl VideoProjectRepo {
    /// Create a new project row in `not_started` with stage `idle`.
    pub async fn create(
        pool: &SqlitePool,
        input: &SubmitRender,
    ) -> Result<VideoProject, sqlx::Error> {
        let query = format!(
            "INSERT INTO video_projects \
                 (id, song_id, user_id, state, stage, progress, visual_config, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(&input.song_id)
            .bind(&input.user_id)
            .bind(ProjectState::NotStarted)
            .bind(RenderStage::Idle)
            .bind(&input.visual_config)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Find a project by its ID.
    pub async fn find_by_id(
        pool: &SqlitePool,
        id: &DbId,
    ) -> Result<Option<VideoProject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM video_projects WHERE id = $1");
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the project for a given song/user pair, if one exists.
    ///
    /// The submission endpoint reuses this row across retries and
    /// re-renders rather than creating one per request.
    pub async fn find_by_song_and_user(
        pool: &SqlitePool,
        song_id: &DbId,
        user_id: &DbId,
    ) -> Result<Option<VideoProject>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM video_projects \
             WHERE song_id = $1 AND user_id = $2 \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(song_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's projects, newest first.
    pub async fn list_by_user(
        pool: &SqlitePool,
        params: &ProjectListQuery,
    ) -> Result<Vec<VideoProject>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM video_projects \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(&params.user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Replace the stored visual configuration (a re-render may carry a
    /// new one).
    pub async fn set_visual_config(
        pool: &SqlitePool,
        id: &DbId,
        visual_config: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE video_projects SET visual_config = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(visual_config)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `rendering`: stage `starting`, progress reset to 0,
    /// error cleared, prior output reference cleared.
    pub async fn mark_rendering(
        pool: &SqlitePool,
        id: &DbId,
        job_handle: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE video_projects \
             SET state = $2, stage = $3, progress = 0, job_handle = $4, \
                 error_message = NULL, output_path = NULL, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ProjectState::Rendering)
        .bind(RenderStage::Starting)
        .bind(job_handle)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update the advisory stage and progress. Progress is clamped to
    /// [0, 100].
    pub async fn update_progress(
        pool: &SqlitePool,
        id: &DbId,
        stage: RenderStage,
        progress: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE video_projects \
             SET stage = $2, progress = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(stage)
        .bind(progress.clamp(0, 100))
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `completed`: progress forced to 100, output
    /// reference recorded, completion timestamp set at first success.
    pub async fn mark_completed(
        pool: &SqlitePool,
        id: &DbId,
        output_path: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE video_projects \
             SET state = $2, stage = $3, progress = 100, output_path = $4, \
                 completed_at = COALESCE(completed_at, $5), updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ProjectState::Completed)
        .bind(RenderStage::Completed)
        .bind(output_path)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `failed` with a message truncated to
    /// [`MAX_ERROR_LEN`].
    pub async fn mark_failed(
        pool: &SqlitePool,
        id: &DbId,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE video_projects \
             SET state = $2, stage = $3, error_message = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ProjectState::Failed)
        .bind(RenderStage::Failed)
        .bind(truncate_error(message))
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Truncate an error message to [`MAX_ERROR_LEN`] characters, keeping
/// the end. Encoder diagnostics report the actual failure last, so the
/// tail is the part worth storing.
fn truncate_error(message: &str) -> String {
    let count = message.chars().count();
    if count <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().skip(count - MAX_ERROR_LEN).collect()
}
