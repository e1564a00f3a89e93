// src/config.rs

use crate::error::Result;
use crate::types::{ColorRgb, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub court: CourtConfig,
    #[serde(default)]
    pub kinematics: KinematicsConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub possession: PossessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Directory scanned for recordings (frame sequences + detections).
    pub input_dir: String,
    /// Directory receiving per-recording analysis JSON files.
    pub output_dir: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "input_videos".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical pixel bands `[x_start, x_end)` where background features
    /// are detected, chosen to avoid the playing area.
    pub margin_bands: Vec<[usize; 2]>,
    /// Cap on detected corner features.
    pub max_features: usize,
    /// Corner score threshold relative to the strongest corner [0, 1].
    pub quality_level: f32,
    /// Minimum pixel distance between accepted features.
    pub min_feature_distance: f32,
    /// Side of the square gradient window used for corner scoring.
    pub corner_block_size: usize,
    /// Half-size of the SAD patch used by the flow matcher.
    pub flow_patch_radius: usize,
    /// Flow search radius in pixels (both axes).
    pub flow_search_radius: usize,
    /// Mean per-pixel SAD above which a match counts as a lost feature.
    pub flow_max_residual: f32,
    /// L1 displacement (px) a feature must exceed before the frame is
    /// treated as real camera motion.
    pub min_movement: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            margin_bands: vec![[0, 20], [900, 1050]],
            max_features: 100,
            quality_level: 0.3,
            min_feature_distance: 3.0,
            corner_block_size: 7,
            flow_patch_radius: 7,
            flow_search_radius: 15,
            flow_max_residual: 20.0,
            min_movement: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtConfig {
    /// Four pixel-space court landmarks, in correspondence order with
    /// `court_vertices`.
    pub pixel_vertices: [[f32; 2]; 4],
    /// The landmarks' real-world court coordinates in meters.
    pub court_vertices: [[f32; 2]; 4],
}

impl Default for CourtConfig {
    fn default() -> Self {
        // Visible quadrilateral of the broadcast camera mapped onto a
        // 23.32 m x 68 m slice of the pitch.
        Self {
            pixel_vertices: [
                [110.0, 1035.0],
                [265.0, 275.0],
                [910.0, 260.0],
                [1640.0, 915.0],
            ],
            court_vertices: [[0.0, 68.0], [0.0, 0.0], [23.32, 0.0], [23.32, 68.0]],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Frames per speed window; one speed value is assigned to every
    /// frame within a window.
    pub window_frames: usize,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self { window_frames: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Fallback centroids (RGB) used when the reference frame yields
    /// fewer than two valid player color samples.
    pub default_colors: [ColorRgb; 2],
    /// Manual `player id → team` overrides applied regardless of color.
    pub overrides: HashMap<TrackId, u8>,
    /// Seed for the k-means clusterer; fixed for deterministic output.
    pub kmeans_seed: u64,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            default_colors: [[255.0, 0.0, 0.0], [0.0, 255.0, 0.0]],
            overrides: HashMap::new(),
            kmeans_seed: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Maximum pixel distance from the ball center to a player's nearer
    /// bottom bbox corner for possession to be assigned.
    pub max_player_ball_distance: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "cache".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "footyvision=info".to_string(),
        }
    }
}
