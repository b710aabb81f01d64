//! Configuration management for quadwarp

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::transform::Interpolation;

/// Default half-size of the square pick zone around each corner handle
pub const DEFAULT_HIT_RADIUS: i32 = 50;
/// Default radius of the filled circle drawn at each corner
pub const DEFAULT_MARKER_RADIUS: i32 = 30;

/// Source image settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub path: PathBuf,
    /// Mirror the source left-to-right after decoding
    pub flip_horizontal: bool,
    /// Mirror the source top-to-bottom after decoding
    pub flip_vertical: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("test.png"),
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

/// Window and event loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    /// Sleep between event polls
    pub poll_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "Draggable Corners".to_string(),
            poll_interval_ms: 1,
        }
    }
}

/// Corner handle picking and drawing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    pub hit_radius: i32,
    pub marker_radius: i32,
    pub marker_color: [u8; 3],
    /// Draw a dashed outline connecting the four corners
    pub show_outline: bool,
    pub outline_color: [u8; 3],
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            hit_radius: DEFAULT_HIT_RADIUS,
            marker_radius: DEFAULT_MARKER_RADIUS,
            marker_color: [255, 0, 0],
            show_outline: false,
            outline_color: [0, 0, 255],
        }
    }
}

/// Resampling settings for the perspective warp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub interpolation: Interpolation,
    /// Fill for destination pixels that map outside the source
    pub background: [u8; 3],
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            background: [0, 0, 0],
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub handles: HandleConfig,

    #[serde(default)]
    pub warp: WarpConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values the session cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if self.handles.hit_radius <= 0 {
            return Err(Error::Config(format!(
                "hit radius must be positive, got {}",
                self.handles.hit_radius
            )));
        }
        if self.handles.marker_radius < 0 {
            return Err(Error::Config(format!(
                "marker radius must not be negative, got {}",
                self.handles.marker_radius
            )));
        }
        if self.display.title.is_empty() {
            return Err(Error::Config("window title must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.display.poll_interval_ms)
    }
}
