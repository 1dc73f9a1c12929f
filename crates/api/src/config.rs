//! Server and media-path configuration loaded from environment variables.

use std::path::PathBuf;

use waveclip_core::encoder::EncoderConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `127.0.0.1`                |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        }
    }
}

/// Filesystem roots and encoder binaries for the render pipeline.
///
/// Threaded explicitly through the orchestrator rather than read from
/// ambient constants, so tests can inject temporary roots and stub
/// binaries.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Public asset root. Server-relative references like
    /// `/audio/s1.mp3` resolve beneath it, and finished videos are
    /// promoted into `<public_root>/videos/`.
    pub public_root: PathBuf,
    /// Root for per-job private working directories.
    pub workdir_root: PathBuf,
    /// Encoder/prober binary locations.
    pub encoder: EncoderConfig,
}

impl MediaConfig {
    /// Load media paths from environment variables with defaults.
    ///
    /// | Env Var                | Default            |
    /// |------------------------|--------------------|
    /// | `WAVECLIP_PUBLIC_DIR`  | `./public`         |
    /// | `WAVECLIP_WORKDIR`     | `<tmp>/waveclip`   |
    /// | `WAVECLIP_FFMPEG_BIN`  | `ffmpeg`           |
    /// | `WAVECLIP_FFPROBE_BIN` | `ffprobe`          |
    pub fn from_env() -> Self {
        let public_root = std::env::var("WAVECLIP_PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public"));

        let workdir_root = std::env::var("WAVECLIP_WORKDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("waveclip"));

        Self {
            public_root,
            workdir_root,
            encoder: EncoderConfig::from_env(),
        }
    }

    /// Directory finished videos are promoted into.
    pub fn videos_dir(&self) -> PathBuf {
        self.public_root.join("videos")
    }

    /// Private working directory for one project.
    pub fn workdir_for(&self, project_id: &str) -> PathBuf {
        self.workdir_root.join(project_id)
    }
}
