//! Encoder command-line construction.
//!
//! Translates a [`VisualConfig`](crate::visual::VisualConfig) plus the
//! staged inputs into the full ffmpeg argument list: background input
//! (looped image or generated lavfi source), audio as a second input,
//! scale/pad to the fixed canvas, sequential `drawtext` overlay stages,
//! and fixed output encoding flags tuned for static imagery.

use std::path::{Path, PathBuf};

use crate::visual::{default_background_color, Background, TextLayer};

/// Fixed output canvas.
pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

/// Resolved background input for one job.
///
/// Precedence (explicit custom image > cover art > generated fill) is
/// decided by the orchestrator, which has access to the song record and
/// the filesystem; this module only turns the outcome into arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSource {
    /// A concrete image file, looped for the duration of the audio.
    Image(PathBuf),
    /// A lavfi filter-source expression (solid or gradient fill).
    Lavfi(String),
}

/// Build the lavfi source expression for a generated background, sized
/// to the probed audio duration.
pub fn lavfi_background(background: &Background, duration_secs: f64) -> String {
    match background {
        Background::Solid { color } => format!(
            "color=c={color}:s={CANVAS_WIDTH}x{CANVAS_HEIGHT}:d={duration_secs:.3}"
        ),
        Background::Gradient { from, to } => format!(
            "gradients=s={CANVAS_WIDTH}x{CANVAS_HEIGHT}:c0={from}:c1={to}:d={duration_secs:.3}"
        ),
        // Image-backed modes never reach here; fall back to the default fill.
        Background::Custom { .. } | Background::CoverArt => format!(
            "color=c={}:s={CANVAS_WIDTH}x{CANVAS_HEIGHT}:d={duration_secs:.3}",
            default_background_color()
        ),
    }
}

/// Assemble the full encoder argument list for one render job.
pub fn build_encoder_args(
    background: &BackgroundSource,
    audio_path: &Path,
    text_layers: &[TextLayer],
    output_path: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into()];

    // Background input (first input stream).
    match background {
        BackgroundSource::Image(path) => {
            args.extend(["-loop".into(), "1".into(), "-i".into()]);
            args.push(path.to_string_lossy().into_owned());
        }
        BackgroundSource::Lavfi(source) => {
            args.extend(["-f".into(), "lavfi".into(), "-i".into(), source.clone()]);
        }
    }

    // Audio input (second input stream).
    args.push("-i".into());
    args.push(audio_path.to_string_lossy().into_owned());

    args.extend(["-vf".into(), build_filter_chain(text_layers)]);

    // Fixed output encoding, tuned for static imagery. `-shortest`
    // truncates the looped video to the audio's length so the artifact
    // never exceeds the audio duration.
    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-tune".into(),
        "stillimage".into(),
        "-preset".into(),
        "medium".into(),
        "-crf".into(),
        "18".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        "-movflags".into(),
        "+faststart".into(),
    ]);

    args.push(output_path.to_string_lossy().into_owned());
    args
}

/// Build the `-vf` filter chain: normalize to the canvas, then one
/// `drawtext` stage per overlay, in order.
fn build_filter_chain(text_layers: &[TextLayer]) -> String {
    let mut stages = vec![format!(
        "scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:force_original_aspect_ratio=decrease,\
         pad={CANVAS_WIDTH}:{CANVAS_HEIGHT}:(ow-iw)/2:(oh-ih)/2"
    )];

    for layer in text_layers {
        stages.push(drawtext_stage(layer));
    }

    stages.join(",")
}

/// Render a single overlay as a `drawtext` filter stage.
fn drawtext_stage(layer: &TextLayer) -> String {
    let x = pct_to_px(layer.x_pct, CANVAS_WIDTH);
    let y = pct_to_px(layer.y_pct, CANVAS_HEIGHT);
    format!(
        "drawtext=text='{}':fontfile={}:fontsize={}:fontcolor={}:x={x}:y={y}",
        escape_drawtext(&layer.text),
        default_font_path(),
        layer.font_size,
        layer.color,
    )
}

/// Translate a percentage coordinate into absolute pixels on the canvas.
fn pct_to_px(pct: f64, extent: u32) -> i64 {
    let clamped = pct.clamp(0.0, 100.0);
    (clamped / 100.0 * f64::from(extent)).round() as i64
}

/// Escape overlay text for the drawtext filter.
///
/// Backslashes, quotes, colons, and percent signs all have meaning in
/// filter-graph syntax and break the expression if left literal.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

/// Platform-appropriate font file for text overlays.
pub fn default_font_path() -> &'static str {
    if cfg!(target_os = "macos") {
        "/System/Library/Fonts/Helvetica.ttc"
    } else if cfg!(target_os = "windows") {
        "C\\:/Windows/Fonts/arial.ttf"
    } else {
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
