//! The per-job render pipeline.
//!
//! Strictly sequential within one job: stage inputs, probe duration,
//! build the encoder invocation, encode with rate-limited progress
//! writes, promote the artifact, and mark the project completed. Any
//! failure is converted into a `mark_failed` transition at the top
//! level, and the working directory is removed unconditionally.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::mpsc;

use waveclip_core::types::DbId;
use waveclip_core::visual::VisualConfig;
use waveclip_core::{command, encoder, probe, progress};
use waveclip_db::models::song::Song;
use waveclip_db::models::video_project::RenderStage;
use waveclip_db::repositories::VideoProjectRepo;
use waveclip_db::DbPool;

use crate::config::MediaConfig;

use super::{stage, RenderError};

/// One render job, ready to run as a detached task.
///
/// The caller has already transitioned the project to `rendering` and
/// handed out the job handle; from here on, results are observed only
/// through the project state store.
pub struct RenderJob {
    pub pool: DbPool,
    pub media: Arc<MediaConfig>,
    pub http: reqwest::Client,
    pub project_id: DbId,
    pub song: Song,
    pub config: VisualConfig,
}

impl RenderJob {
    /// Drive the pipeline to a terminal state. Never returns an error:
    /// nothing awaits this task, so every failure is recorded in the
    /// store instead.
    pub async fn run(self) {
        let workdir = self.media.workdir_for(&self.project_id);

        match self.execute(&workdir).await {
            Ok(output_ref) => {
                tracing::info!(
                    project_id = %self.project_id,
                    output = %output_ref,
                    "Render completed",
                );
            }
            Err(e) => {
                tracing::error!(project_id = %self.project_id, error = %e, "Render failed");
                if let Err(db_err) =
                    VideoProjectRepo::mark_failed(&self.pool, &self.project_id, &e.to_string())
                        .await
                {
                    tracing::error!(
                        project_id = %self.project_id,
                        error = %db_err,
                        "Failed to record render failure",
                    );
                }
            }
        }

        // The one unconditional step: never leak the working directory,
        // whatever happened above.
        stage::cleanup_workdir(&workdir).await;
    }

    /// The fallible portion of the pipeline. Returns the public output
    /// reference on success.
    async fn execute(&self, workdir: &Path) -> Result<String, RenderError> {
        // Stage inputs into the job's private working directory.
        self.set_progress(RenderStage::FetchingAudio, 5).await?;
        fs::create_dir_all(workdir).await.map_err(|e| {
            RenderError::Storage {
                path: workdir.display().to_string(),
                source: e,
            }
        })?;
        let audio_path = stage::resolve_audio(
            &self.http,
            &self.media.public_root,
            workdir,
            &self.song.audio_url,
        )
        .await?;

        // Probe the audio duration; it drives progress mapping below.
        self.set_progress(RenderStage::AnalyzingAudio, 10).await?;
        let duration_secs = probe::probe_duration(&self.media.encoder, &audio_path).await?;
        tracing::debug!(
            project_id = %self.project_id,
            duration_secs,
            "Probed audio duration",
        );

        // Build the encoder invocation.
        self.set_progress(RenderStage::PreparingRender, 15).await?;
        let background = stage::resolve_background(
            &self.http,
            &self.media.public_root,
            workdir,
            &self.config.background,
            self.song.cover_art_url.as_deref(),
            duration_secs,
        )
        .await?;
        let private_output = workdir.join("output.mp4");
        let args = command::build_encoder_args(
            &background,
            &audio_path,
            &self.config.text_layers,
            &private_output,
        );

        // Encode. Diagnostic lines arrive on a sync callback, so progress
        // percentages are handed to a writer task over a channel; the
        // callback rate-limits sends to one per 500ms.
        self.set_progress(RenderStage::Encoding, i64::from(progress::ENCODE_PROGRESS_FLOOR))
            .await?;
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        let writer_pool = self.pool.clone();
        let writer_id = self.project_id.clone();
        let writer = tokio::spawn(async move {
            while let Some(pct) = rx.recv().await {
                if let Err(e) = VideoProjectRepo::update_progress(
                    &writer_pool,
                    &writer_id,
                    RenderStage::Encoding,
                    i64::from(pct),
                )
                .await
                {
                    tracing::warn!(project_id = %writer_id, error = %e, "Progress write failed");
                }
            }
        });

        let mut last_pct = progress::ENCODE_PROGRESS_FLOOR;
        let mut last_write: Option<Instant> = None;
        let encode_result = encoder::run(&self.media.encoder, &args, |line| {
            if let Some(elapsed) = progress::parse_elapsed_seconds(line) {
                let pct = progress::encode_progress_percent(elapsed, duration_secs);
                let due = last_write
                    .map(|t| t.elapsed() >= progress::MIN_PROGRESS_WRITE_INTERVAL)
                    .unwrap_or(true);
                if pct > last_pct && due {
                    last_pct = pct;
                    last_write = Some(Instant::now());
                    let _ = tx.send(pct);
                }
            }
        })
        .await;

        // Drain outstanding progress writes before any terminal
        // transition, so `completed` is never overwritten by a stale
        // percentage.
        drop(tx);
        let _ = writer.await;
        encode_result?;

        // Promote the artifact into the public asset location.
        self.set_progress(RenderStage::Finalizing, i64::from(progress::ENCODE_PROGRESS_CEIL))
            .await?;
        let public_output = self
            .media
            .videos_dir()
            .join(format!("{}.mp4", self.project_id));
        stage::promote(&private_output, &public_output).await?;

        let output_ref = format!("/videos/{}.mp4", self.project_id);
        VideoProjectRepo::mark_completed(&self.pool, &self.project_id, &output_ref).await?;
        Ok(output_ref)
    }

    async fn set_progress(&self, stage: RenderStage, percent: i64) -> Result<(), RenderError> {
        VideoProjectRepo::update_progress(&self.pool, &self.project_id, stage, percent).await?;
        Ok(())
    }
}
