use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use waveclip_api::config::{MediaConfig, ServerConfig};
use waveclip_api::router::build_app_router;
use waveclip_api::state::AppState;
use waveclip_core::encoder::EncoderConfig;
use waveclip_db::models::video_project::{RenderStage, VideoProject};
use waveclip_db::repositories::VideoProjectRepo;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Temporary media roots plus stub encoder binaries for one test.
///
/// Keeps the `TempDir` guards alive for the duration of the test; the
/// directories (and anything the pipeline wrote into them) are removed
/// on drop.
pub struct TestEnv {
    pub public: TempDir,
    pub work: TempDir,
    bins: TempDir,
    pub media: Arc<MediaConfig>,
}

impl TestEnv {
    pub fn new() -> Self {
        let public = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let bins = TempDir::new().unwrap();

        let media = Arc::new(MediaConfig {
            public_root: public.path().to_path_buf(),
            workdir_root: work.path().to_path_buf(),
            encoder: EncoderConfig {
                ffmpeg_bin: bins.path().join("ffmpeg").display().to_string(),
                ffprobe_bin: bins.path().join("ffprobe").display().to_string(),
            },
        });

        Self {
            public,
            work,
            bins,
            media,
        }
    }

    /// Install (or replace) the stub ffmpeg executable.
    pub fn install_ffmpeg(&self, script: &str) {
        write_executable(&self.bins.path().join("ffmpeg"), script);
    }

    /// Install (or replace) the stub ffprobe executable.
    pub fn install_ffprobe(&self, script: &str) {
        write_executable(&self.bins.path().join("ffprobe"), script);
    }

    /// Path of the spawn log the happy-path ffmpeg stub appends to.
    pub fn spawn_log(&self) -> PathBuf {
        self.bins.path().join("spawns.log")
    }

    /// Number of real encode invocations (availability probes excluded).
    pub fn spawn_count(&self) -> usize {
        std::fs::read_to_string(self.spawn_log())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Stub ffmpeg that emits progress lines and writes the output file.
    ///
    /// `-version` probes exit immediately without touching the spawn
    /// log; real invocations append one line to it.
    pub fn happy_ffmpeg(&self) -> String {
        format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"-version\" ]; then exit 0; fi\n\
             echo spawned >> '{log}'\n\
             printf 'time=00:00:01.00 bitrate=x\\n' >&2\n\
             printf 'time=00:00:02.00 bitrate=x\\n' >&2\n\
             printf 'time=00:00:03.00 bitrate=x\\n' >&2\n\
             for out in \"$@\"; do :; done\n\
             printf 'video' > \"$out\"\n",
            log = self.spawn_log().display()
        )
    }

    /// Stub ffprobe reporting a three-second duration.
    pub fn happy_ffprobe(&self) -> String {
        "#!/bin/sh\necho 3.000000\n".to_string()
    }

    /// Seed an audio file under the public root and return its
    /// server-relative reference.
    pub fn seed_audio(&self, name: &str) -> String {
        let dir = self.public.path().join("audio");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), b"RIFFfake").unwrap();
        format!("/audio/{name}")
    }
}

fn write_executable(path: &Path, script: &str) {
    std::fs::write(path, script).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

/// Build the full application router with the production middleware
/// stack, backed by the given pool and test media roots.
pub fn build_test_app(pool: SqlitePool, media: Arc<MediaConfig>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        media,
        http: reqwest::Client::new(),
    };
    build_app_router(state, &config)
}

/// Insert a song row directly; song CRUD is out of scope for this
/// service, so tests seed the table raw.
pub async fn seed_song(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    audio_url: &str,
    cover_art_url: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO songs (id, user_id, title, audio_url, cover_art_url, created_at) \
         VALUES ($1, $2, 'Test Song', $3, $4, $5)",
    )
    .bind(id)
    .bind(user_id)
    .bind(audio_url)
    .bind(cover_art_url)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the project row until `pred` holds, panicking after five
/// seconds. Detached render tasks are only observable through the
/// store, so every end-to-end assertion goes through here.
pub async fn wait_for_project<F>(pool: &SqlitePool, id: &str, pred: F) -> VideoProject
where
    F: Fn(&VideoProject) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let project = VideoProjectRepo::find_by_id(pool, &id.to_string())
            .await
            .unwrap()
            .unwrap();
        if pred(&project) {
            return project;
        }
        if Instant::now() > deadline {
            panic!(
                "timed out waiting for project {id}; state={:?} stage={:?} progress={}",
                project.state, project.stage, project.progress
            );
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Poll the project until it reaches a terminal state, recording every
/// distinct `(stage, progress)` pair observed along the way. Polling is
/// a sample, not a log, so a fast job may skip points; what a client
/// observes must still be ordered.
pub async fn wait_for_terminal_with_trace(
    pool: &SqlitePool,
    id: &str,
) -> (VideoProject, Vec<(RenderStage, i64)>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut trace: Vec<(RenderStage, i64)> = Vec::new();
    loop {
        let project = VideoProjectRepo::find_by_id(pool, &id.to_string())
            .await
            .unwrap()
            .unwrap();
        let point = (project.stage, project.progress);
        if trace.last() != Some(&point) {
            trace.push(point);
        }
        if project.state.is_terminal() {
            return (project, trace);
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for project {id}; trace={trace:?}");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
