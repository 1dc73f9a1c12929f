//! External encoder (ffmpeg) process supervision.
//!
//! Provides [`check_available`], the liveness gate run once before any
//! render job starts, and [`run`], which spawns the encoder, streams its
//! diagnostic (stderr) output line-by-line to a caller-supplied callback,
//! and surfaces non-zero exits with a bounded diagnostic tail.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Timeout for the `-version` availability probe.
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum diagnostic tail retained for error reporting (bytes).
///
/// The encoder can emit megabytes of stderr on a long encode; only the
/// final portion is useful for debugging a failure.
const STDERR_TAIL_BYTES: usize = 4096;

/// Read buffer size for the diagnostic stream.
const READ_CHUNK_BYTES: usize = 4096;

/// Binary names (or paths) for the encoder and its companion prober.
///
/// Injectable so tests can substitute stub executables and deployments
/// can point at non-PATH installs.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Encoder binary, e.g. `ffmpeg`.
    pub ffmpeg_bin: String,
    /// Prober binary, e.g. `ffprobe`.
    pub ffprobe_bin: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl EncoderConfig {
    /// Load binary locations from `WAVECLIP_FFMPEG_BIN` /
    /// `WAVECLIP_FFPROBE_BIN`, falling back to PATH lookups.
    pub fn from_env() -> Self {
        Self {
            ffmpeg_bin: std::env::var("WAVECLIP_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".into()),
            ffprobe_bin: std::env::var("WAVECLIP_FFPROBE_BIN")
                .unwrap_or_else(|_| "ffprobe".into()),
        }
    }
}

/// Error type for encoder invocations.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("failed to spawn encoder '{bin}': {source}")]
    Spawn {
        bin: String,
        source: std::io::Error,
    },

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder exited with status {exit_code:?}: {stderr_tail}")]
    Exit {
        exit_code: Option<i32>,
        stderr_tail: String,
    },
}

/// Check whether the encoder binary can be invoked at all.
///
/// Runs `<ffmpeg> -version` with a bounded timeout. Returns `false` if
/// the binary cannot be spawned, exits non-zero, or does not respond in
/// time. Purely advisory; nothing is persisted.
pub async fn check_available(config: &EncoderConfig) -> bool {
    let status = tokio::time::timeout(
        AVAILABILITY_TIMEOUT,
        Command::new(&config.ffmpeg_bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status(),
    )
    .await;

    matches!(status, Ok(Ok(s)) if s.success())
}

/// Run the encoder to completion with the given argument list.
///
/// The encoder's stderr is streamed to `on_diagnostic_line` one line at
/// a time (split on both `\n` and `\r` -- ffmpeg rewrites its progress
/// line with carriage returns). The last [`STDERR_TAIL_BYTES`] of
/// diagnostics are retained and included in [`EncoderError::Exit`] on a
/// non-zero exit.
///
/// There is no timeout here: encode duration is proportional to media
/// length, so any ceiling belongs at the orchestration layer.
pub async fn run<F>(
    config: &EncoderConfig,
    args: &[String],
    mut on_diagnostic_line: F,
) -> Result<(), EncoderError>
where
    F: FnMut(&str),
{
    let mut child = Command::new(&config.ffmpeg_bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EncoderError::Spawn {
            bin: config.ffmpeg_bin.clone(),
            source: e,
        })?;

    let mut tail = String::new();

    if let Some(mut stderr) = child.stderr.take() {
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            let n = stderr.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending);
                        on_diagnostic_line(&line);
                        push_tail(&mut tail, &line);
                        pending.clear();
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending);
            on_diagnostic_line(&line);
            push_tail(&mut tail, &line);
        }
    }

    let status = child.wait().await?;

    if !status.success() {
        return Err(EncoderError::Exit {
            exit_code: status.code(),
            stderr_tail: tail,
        });
    }

    Ok(())
}

/// Append a line to the rolling diagnostic tail, trimming the front to
/// keep at most [`STDERR_TAIL_BYTES`] bytes (on a char boundary).
fn push_tail(tail: &mut String, line: &str) {
    tail.push_str(line);
    tail.push('\n');
    if tail.len() > STDERR_TAIL_BYTES {
        let mut cut = tail.len() - STDERR_TAIL_BYTES;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_config() -> EncoderConfig {
        EncoderConfig {
            ffmpeg_bin: "sh".to_string(),
            ffprobe_bin: "sh".to_string(),
        }
    }

    // -- check_available ------------------------------------------------------

    #[tokio::test]
    async fn available_when_binary_exits_zero() {
        // `true -version` ignores the flag and exits 0.
        let config = EncoderConfig {
            ffmpeg_bin: "true".to_string(),
            ffprobe_bin: "true".to_string(),
        };
        assert!(check_available(&config).await);
    }

    #[tokio::test]
    async fn unavailable_when_binary_exits_nonzero() {
        let config = EncoderConfig {
            ffmpeg_bin: "false".to_string(),
            ffprobe_bin: "false".to_string(),
        };
        assert!(!check_available(&config).await);
    }

    #[tokio::test]
    async fn unavailable_when_binary_missing() {
        let config = EncoderConfig {
            ffmpeg_bin: "/nonexistent/waveclip-ffmpeg".to_string(),
            ffprobe_bin: "/nonexistent/waveclip-ffprobe".to_string(),
        };
        assert!(!check_available(&config).await);
    }

    // -- run ------------------------------------------------------------------

    #[tokio::test]
    async fn run_streams_diagnostic_lines() {
        let mut lines: Vec<String> = Vec::new();
        let args = vec![
            "-c".to_string(),
            "echo one >&2; echo two >&2".to_string(),
        ];
        run(&sh_config(), &args, |line| lines.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn run_splits_carriage_return_lines() {
        let mut lines: Vec<String> = Vec::new();
        let args = vec![
            "-c".to_string(),
            "printf 'a\\rb\\rc\\n' >&2".to_string(),
        ];
        run(&sh_config(), &args, |line| lines.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn run_nonzero_exit_carries_stderr_tail() {
        let args = vec![
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ];
        let err = run(&sh_config(), &args, |_| {}).await.unwrap_err();
        match err {
            EncoderError::Exit {
                exit_code,
                stderr_tail,
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("expected Exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_spawn_failure() {
        let config = EncoderConfig {
            ffmpeg_bin: "/nonexistent/waveclip-ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        };
        let err = run(&config, &[], |_| {}).await.unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }));
    }

    // -- push_tail ------------------------------------------------------------

    #[test]
    fn tail_is_bounded() {
        let mut tail = String::new();
        for _ in 0..100 {
            push_tail(&mut tail, &"x".repeat(100));
        }
        assert!(tail.len() <= STDERR_TAIL_BYTES);
        assert!(tail.ends_with(&format!("{}\n", "x".repeat(100))));
    }
}
