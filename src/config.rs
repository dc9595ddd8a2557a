//! Typed settings for a drawing session, loadable from a JSON file.

use std::{fs, path::Path, time::Duration};

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, landmarks::DetectorProfile};

pub const MIN_BRUSH_WIDTH: u32 = 1;
pub const MAX_BRUSH_WIDTH: u32 = 30;
pub const MIN_BACKGROUND_OPACITY: u8 = 10;
pub const MAX_BACKGROUND_OPACITY: u8 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub brush: BrushConfig,
    pub background: Option<BackgroundConfig>,
    pub camera: CameraConfig,
    pub detector: DetectorProfile,
    pub classifier: ClassifierConfig,
    pub debounce: DebounceConfig,
    pub history: HistoryConfig,
    pub frame_loop: FrameLoopConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Clamp ranged values into bounds and reject colors that do not parse.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.brush.width = self.brush.width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
        parse_hex_color(&self.brush.color)?;
        if let Some(background) = self.background.as_mut() {
            background.opacity = background
                .opacity
                .clamp(MIN_BACKGROUND_OPACITY, MAX_BACKGROUND_OPACITY);
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            let defaults = CameraConfig::default();
            log::warn!(
                "camera resolution {}x{} is unusable, falling back to {}x{}",
                self.camera.width,
                self.camera.height,
                defaults.width,
                defaults.height
            );
            self.camera.width = defaults.width;
            self.camera.height = defaults.height;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    /// `#RRGGBB`
    pub color: String,
    pub width: u32,
    pub eraser: bool,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 5,
            eraser: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// File path or `data:image/...;base64,` URI.
    pub source: String,
    /// Percent, 10..=100.
    #[serde(default = "default_opacity")]
    pub opacity: u8,
}

fn default_opacity() -> u8 {
    MAX_BACKGROUND_OPACITY
}

/// Resolution hints for the capture side. Incoming hand positions live in this
/// logical space and get rescaled to the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub mirrored: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            mirrored: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThumbRule {
    /// Tip-to-wrist distance in pixels.
    FixedPixels { threshold: f32 },
    /// Tip-to-wrist distance relative to the wrist to middle-mcp length.
    HandScaled { ratio: f32 },
}

impl Default for ThumbRule {
    fn default() -> Self {
        ThumbRule::FixedPixels { threshold: 50.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub extension_angle_deg: f32,
    pub min_segment_px: f32,
    pub thumb: ThumbRule,
    pub fingers_close_px: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extension_angle_deg: 120.0,
            min_segment_px: 5.0,
            thumb: ThumbRule::default(),
            fingers_close_px: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub clear_hold_ms: u64,
    pub clear_cooldown_ms: u64,
    pub palette_slots: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            clear_hold_ms: 1_500,
            clear_cooldown_ms: 3_000,
            palette_slots: 8,
        }
    }
}

impl DebounceConfig {
    pub fn clear_hold(&self) -> Duration {
        Duration::from_millis(self.clear_hold_ms)
    }

    pub fn clear_cooldown(&self) -> Duration {
        Duration::from_millis(self.clear_cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLoopConfig {
    pub init_attempts: u32,
    pub init_backoff_ms: u64,
    pub max_error_skip: u32,
    pub slow_inference_ms: u64,
    /// Consecutive failed detections before the detector is rebuilt.
    pub reinit_after_errors: u32,
}

impl FrameLoopConfig {
    pub fn init_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.init_backoff_ms.saturating_mul(1 << attempt.min(16)))
    }

    pub fn slow_inference(&self) -> Duration {
        Duration::from_millis(self.slow_inference_ms)
    }
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            init_attempts: 3,
            init_backoff_ms: 200,
            max_error_skip: 8,
            slow_inference_ms: 50,
            reinit_after_errors: 50,
        }
    }
}

pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>, ConfigError> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(ConfigError::InvalidColor(value.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| ConfigError::InvalidColor(value.to_string()))
    };
    Ok(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

pub fn to_hex_color(color: Rgba<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#FFA500").unwrap(), Rgba([255, 165, 0, 255]));
        assert_eq!(parse_hex_color("800080").unwrap(), Rgba([128, 0, 128, 255]));
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GG0000").is_err());
        assert_eq!(to_hex_color(Rgba([255, 192, 203, 255])), "#FFC0CB");
    }

    #[test]
    fn validate_clamps_ranges() {
        let mut config = AppConfig::default();
        config.brush.width = 99;
        config.background = Some(BackgroundConfig {
            source: "bg.png".into(),
            opacity: 3,
        });
        config.validate().unwrap();
        assert_eq!(config.brush.width, MAX_BRUSH_WIDTH);
        assert_eq!(config.background.unwrap().opacity, MIN_BACKGROUND_OPACITY);

        let mut config = AppConfig::default();
        config.brush.width = 0;
        config.validate().unwrap();
        assert_eq!(config.brush.width, MIN_BRUSH_WIDTH);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r##"{ "brush": { "color": "#FF0000" }, "classifier": { "thumb": { "kind": "hand_scaled", "ratio": 0.9 } } }"##;
        let mut config: AppConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.brush.width, 5);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 360);
        assert_eq!(config.debounce.clear_hold_ms, 1_500);
        assert_eq!(config.classifier.thumb, ThumbRule::HandScaled { ratio: 0.9 });
    }

    #[test]
    fn rejects_bad_brush_color() {
        let mut config = AppConfig::default();
        config.brush.color = "blue".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidColor(_))));
    }
}
