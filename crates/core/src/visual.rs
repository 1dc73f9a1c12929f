//! Visual configuration for a render job.
//!
//! Owned entirely by the caller: the orchestrator treats one of these as
//! an immutable input to the command-building step for one job. The
//! `effects` blob is opaque here -- it parameterizes the client-side
//! visualizer and never influences server-side encoding.

use serde::{Deserialize, Serialize};

/// Declarative visual configuration submitted with a render request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualConfig {
    /// Named preset the client built this config from, if any.
    #[serde(default)]
    pub preset: Option<String>,

    /// Background selection. Custom image beats the song's cover art,
    /// which beats a procedurally generated fill.
    #[serde(default)]
    pub background: Background,

    /// Text overlays, rendered as sequential filter stages in order.
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,

    /// Opaque per-effect parameters, passed through untouched.
    #[serde(default)]
    pub effects: serde_json::Value,
}

/// Background mode for the rendered video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Background {
    /// Explicit image supplied by the user (server-relative asset path).
    Custom { path: String },
    /// Use the song's own cover artwork.
    CoverArt,
    /// Generated solid fill.
    Solid { color: String },
    /// Generated two-color gradient fill.
    Gradient { from: String, to: String },
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid {
            color: default_background_color(),
        }
    }
}

/// Fallback fill color when the caller specifies nothing usable.
pub fn default_background_color() -> String {
    "#101020".to_string()
}

/// One text overlay, positioned by percentage coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextLayer {
    pub text: String,
    /// Horizontal position as a percentage of canvas width (0-100).
    #[serde(default = "default_center")]
    pub x_pct: f64,
    /// Vertical position as a percentage of canvas height (0-100).
    #[serde(default = "default_center")]
    pub y_pct: f64,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
}

fn default_center() -> f64 {
    50.0
}

fn default_font_size() -> u32 {
    64
}

fn default_text_color() -> String {
    "white".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_config() {
        let config: VisualConfig = serde_json::from_str("{}").unwrap();
        assert!(config.text_layers.is_empty());
        assert!(matches!(config.background, Background::Solid { .. }));
    }

    #[test]
    fn deserializes_gradient_background() {
        let config: VisualConfig = serde_json::from_value(serde_json::json!({
            "background": { "type": "gradient", "from": "#000000", "to": "#3040a0" },
            "text_layers": [{ "text": "My Song" }],
        }))
        .unwrap();
        assert_eq!(
            config.background,
            Background::Gradient {
                from: "#000000".into(),
                to: "#3040a0".into()
            }
        );
        assert_eq!(config.text_layers[0].x_pct, 50.0);
        assert_eq!(config.text_layers[0].font_size, 64);
    }

    #[test]
    fn deserializes_custom_background() {
        let config: VisualConfig = serde_json::from_value(serde_json::json!({
            "background": { "type": "custom", "path": "/images/bg.png" },
        }))
        .unwrap();
        assert_eq!(
            config.background,
            Background::Custom {
                path: "/images/bg.png".into()
            }
        );
    }
}
