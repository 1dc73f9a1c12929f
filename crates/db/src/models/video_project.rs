//! Video project entity, lifecycle enums, and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use waveclip_core::types::{DbId, Timestamp};

/// Top-level lifecycle state of a render project.
///
/// Transitions are monotonic except `failed -> rendering` (explicit
/// retry) and `completed -> rendering` (explicit re-render, overwriting
/// prior output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectState {
    NotStarted,
    Rendering,
    Completed,
    Uploading,
    Uploaded,
    Failed,
    Cancelled,
}

impl ProjectState {
    /// Terminal states require no further polling.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProjectState::Completed
                | ProjectState::Uploaded
                | ProjectState::Failed
                | ProjectState::Cancelled
        )
    }

    /// States a (re-)render may start from. The only re-entries the
    /// lifecycle permits are retry (`failed`) and re-render
    /// (`completed`); an upload in flight or a finished/cancelled
    /// project must not be clobbered by a new render.
    pub fn can_begin_render(self) -> bool {
        matches!(
            self,
            ProjectState::NotStarted | ProjectState::Failed | ProjectState::Completed
        )
    }
}

/// Fine-grained sub-stage of the `rendering` state. Advisory, for UI
/// display only -- never used for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RenderStage {
    Idle,
    Queued,
    Starting,
    FetchingAudio,
    AnalyzingAudio,
    PreparingRender,
    Processing,
    Encoding,
    Finalizing,
    Completed,
    Failed,
}

impl RenderStage {
    /// Parse a client-supplied stage string; unknown values are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

/// A row from the `video_projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VideoProject {
    pub id: DbId,
    pub song_id: DbId,
    pub user_id: DbId,
    pub state: ProjectState,
    pub stage: RenderStage,
    pub progress: i64,
    pub job_handle: Option<String>,
    #[sqlx(json)]
    pub visual_config: serde_json::Value,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for `POST /api/v1/render`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRender {
    pub song_id: DbId,
    pub user_id: DbId,
    /// Opaque visual configuration blob, stored verbatim.
    #[serde(default = "default_visual_config")]
    pub visual_config: serde_json::Value,
}

fn default_visual_config() -> serde_json::Value {
    serde_json::json!({})
}

/// DTO for `POST /api/v1/render/{id}/progress` (client-rendered jobs).
///
/// Maps onto the same state machine the server-side orchestrator drives:
/// an error message means failed, progress >= 100 means completed,
/// anything else means rendering.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientProgressUpdate {
    pub stage: Option<String>,
    pub progress: Option<i64>,
    pub error_message: Option<String>,
}

/// Query parameters for `GET /api/v1/render`.
#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub user_id: DbId,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
