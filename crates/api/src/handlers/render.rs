//! Render submission, status polling, and client progress pushes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use waveclip_core::encoder;
use waveclip_core::types::DbId;
use waveclip_core::visual::VisualConfig;
use waveclip_db::models::video_project::{
    ClientProgressUpdate, ProjectListQuery, ProjectState, RenderStage, SubmitRender, VideoProject,
};
use waveclip_db::repositories::{SongRepo, VideoProjectRepo};

use crate::error::{AppError, AppResult};
use crate::render::{RenderJob, ENCODER_INSTALL_HINT};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for an accepted render submission.
#[derive(Debug, Serialize)]
pub struct RenderAccepted {
    pub project_id: DbId,
    pub job_handle: String,
}

/// POST /api/v1/render -- submit a song for rendering.
///
/// The request returns as soon as the project has transitioned to
/// `rendering`; the pipeline itself runs as a detached task and is
/// observed by polling [`get_render_status`]. Submitting while a render
/// is already in flight for the same song/user pair is a no-op and
/// returns the in-flight job's handle.
pub async fn submit_render(
    State(state): State<AppState>,
    Json(input): Json<SubmitRender>,
) -> AppResult<(StatusCode, Json<DataResponse<RenderAccepted>>)> {
    let song = SongRepo::find_by_id(&state.pool, &input.song_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Song",
            id: input.song_id.clone(),
        })?;

    // Reuse the existing project row for this song/user pair if there
    // is one; duplicate submissions against an in-flight render return
    // its handle instead of spawning a second job.
    let project = match VideoProjectRepo::find_by_song_and_user(
        &state.pool,
        &input.song_id,
        &input.user_id,
    )
    .await?
    {
        Some(existing) => {
            if existing.state == ProjectState::Rendering {
                tracing::info!(
                    project_id = %existing.id,
                    "Duplicate submission; render already in flight",
                );
                return Ok((
                    StatusCode::OK,
                    Json(DataResponse {
                        data: RenderAccepted {
                            project_id: existing.id.clone(),
                            job_handle: existing.job_handle.clone().unwrap_or_default(),
                        },
                    }),
                ));
            }
            // Only retry (`failed`) and re-render (`completed`) re-enter
            // the pipeline; an upload in flight or a cancelled project
            // must not be reset to `rendering`.
            if !existing.state.can_begin_render() {
                return Err(AppError::Conflict(format!(
                    "Project {} cannot be rendered from its current state",
                    existing.id
                )));
            }
            existing
        }
        None => VideoProjectRepo::create(&state.pool, &input).await?,
    };

    // Validate the visual configuration before committing to a render.
    // An explicit `null` means "no preferences", same as omitting it.
    let visual_config = if input.visual_config.is_null() {
        serde_json::json!({})
    } else {
        input.visual_config.clone()
    };
    let config: VisualConfig = serde_json::from_value(visual_config.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid visual config: {e}")))?;
    VideoProjectRepo::set_visual_config(&state.pool, &project.id, &visual_config).await?;

    // Gate on encoder availability up front so a missing binary fails
    // the submission with an actionable message, not a dead job.
    if !encoder::check_available(&state.media.encoder).await {
        VideoProjectRepo::mark_failed(&state.pool, &project.id, ENCODER_INSTALL_HINT).await?;
        return Err(AppError::Unavailable(ENCODER_INSTALL_HINT.to_string()));
    }

    let job_handle = Uuid::new_v4().to_string();
    VideoProjectRepo::mark_rendering(&state.pool, &project.id, &job_handle).await?;

    tracing::info!(
        project_id = %project.id,
        song_id = %song.id,
        job_handle = %job_handle,
        "Render job accepted",
    );

    let job = RenderJob {
        pool: state.pool.clone(),
        media: state.media.clone(),
        http: state.http.clone(),
        project_id: project.id.clone(),
        song,
        config,
    };
    tokio::spawn(job.run());

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RenderAccepted {
                project_id: project.id,
                job_handle,
            },
        }),
    ))
}

/// GET /api/v1/render/{project_id} -- poll a project's state.
pub async fn get_render_status(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<VideoProject>>> {
    let project = VideoProjectRepo::find_by_id(&state.pool, &project_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Video project",
            id: project_id,
        })?;

    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/render -- list a user's projects, newest first.
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ProjectListQuery>,
) -> AppResult<Json<DataResponse<Vec<VideoProject>>>> {
    let projects = VideoProjectRepo::list_by_user(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// POST /api/v1/render/{project_id}/progress -- progress push for
/// client-rendered jobs.
///
/// Maps onto the same state machine the server-side pipeline drives: an
/// error message means failed, progress at or past 100 means completed,
/// anything else records the reported stage and percentage.
pub async fn push_progress(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(update): Json<ClientProgressUpdate>,
) -> AppResult<Json<DataResponse<VideoProject>>> {
    let project = VideoProjectRepo::find_by_id(&state.pool, &project_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Video project",
            id: project_id.clone(),
        })?;

    if let Some(message) = update.error_message.as_deref().filter(|m| !m.is_empty()) {
        VideoProjectRepo::mark_failed(&state.pool, &project_id, message).await?;
    } else if update.progress.is_some_and(|p| p >= 100) {
        // A client-side render produces its own artifact; keep any
        // output reference already on the row.
        let output = project
            .output_path
            .clone()
            .unwrap_or_else(|| format!("/videos/{project_id}.mp4"));
        VideoProjectRepo::mark_completed(&state.pool, &project_id, &output).await?;
    } else {
        if project.state != ProjectState::Rendering {
            // Same re-entry rules as submission: never pull an upload
            // or a cancelled project back into `rendering`.
            if !project.state.can_begin_render() {
                return Err(AppError::Conflict(format!(
                    "Project {project_id} cannot report render progress from its current state"
                )));
            }
            let handle = project
                .job_handle
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            VideoProjectRepo::mark_rendering(&state.pool, &project_id, &handle).await?;
        }
        let stage = update
            .stage
            .as_deref()
            .and_then(RenderStage::parse)
            .unwrap_or(RenderStage::Processing);
        let progress = update.progress.unwrap_or(project.progress);
        VideoProjectRepo::update_progress(&state.pool, &project_id, stage, progress).await?;
    }

    let refreshed = VideoProjectRepo::find_by_id(&state.pool, &project_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Video project",
            id: project_id,
        })?;

    Ok(Json(DataResponse { data: refreshed }))
}
