//! Media duration probing via the companion prober (ffprobe).
//!
//! The probed duration drives progress-percentage computation during the
//! encode; it is never guessed. A malformed file, a prober crash, and a
//! timeout all abort the job the same way, so they share one error type.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::encoder::EncoderConfig;

/// Timeout for one probe invocation.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for probe operations.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to spawn prober '{bin}': {source}")]
    Spawn {
        bin: String,
        source: std::io::Error,
    },

    #[error("prober exited with status {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("could not parse duration from prober output: {0:?}")]
    Parse(String),

    #[error("prober timed out after {} seconds", PROBE_TIMEOUT.as_secs())]
    Timeout,
}

/// Return the duration of a decoded audio asset in seconds.
///
/// Invokes `ffprobe -v error -show_entries format=duration -of
/// default=noprint_wrappers=1:nokey=1 <path>`, which prints a single
/// float on stdout.
pub async fn probe_duration(config: &EncoderConfig, path: &Path) -> Result<f64, ProbeError> {
    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(&config.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ProbeError::Timeout)?
    .map_err(|e| ProbeError::Spawn {
        bin: config.ffprobe_bin.clone(),
        source: e,
    })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.trim();
    text.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ProbeError::Parse(text.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    /// Write an executable stub prober script and return its config.
    fn stub_prober(body: &str) -> (tempfile::TempDir, EncoderConfig) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffprobe-stub");
        let mut f = std::fs::File::create(&script).unwrap();
        writeln!(f, "#!/bin/sh\n{body}").unwrap();
        drop(f);
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = EncoderConfig {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: script.to_string_lossy().to_string(),
        };
        (dir, config)
    }

    #[tokio::test]
    async fn parses_duration_from_stdout() {
        let (_dir, config) = stub_prober("echo 5.016");
        let d = probe_duration(&config, Path::new("/tmp/whatever.mp3"))
            .await
            .unwrap();
        assert!((d - 5.016).abs() < 1e-9);
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed() {
        let (_dir, config) = stub_prober("echo 'no such file' >&2; exit 1");
        let err = probe_duration(&config, Path::new("/tmp/whatever.mp3"))
            .await
            .unwrap_err();
        match err {
            ProbeError::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("no such file"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_output_is_parse_error() {
        let (_dir, config) = stub_prober("echo N/A");
        let err = probe_duration(&config, Path::new("/tmp/whatever.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[tokio::test]
    async fn zero_duration_is_parse_error() {
        let (_dir, config) = stub_prober("echo 0.0");
        let err = probe_duration(&config, Path::new("/tmp/whatever.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let config = EncoderConfig {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "/nonexistent/waveclip-ffprobe".to_string(),
        };
        let err = probe_duration(&config, Path::new("/tmp/whatever.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
