// src/detection.rs
//
// Detector/tracker collaborator. The backend (YOLO + ByteTrack or
// equivalent) lives outside this crate; what the pipeline consumes is
// its output: per frame, a set of persistent track ids with a class
// label and a bounding box. Player/referee ids persist across frames;
// the ball arrives as at most one detection per frame under id 1.

use crate::error::Result;
use crate::types::{Bbox, TrackId, BALL_TRACK_ID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Player,
    Referee,
    Ball,
}

/// One tracked detection in one frame, as emitted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub track_id: TrackId,
    pub class: DetectionClass,
    pub bbox: Bbox,
}

/// All detections for one frame.
pub type FrameDetections = Vec<RawDetection>;

/// Produces the full ordered detection sequence for one recording.
pub trait DetectionSource {
    fn detections(&mut self) -> Result<Vec<FrameDetections>>;
}

/// Detections exported by the backend as a JSON file: one outer array
/// with one inner detection list per frame.
pub struct JsonDetectionFile {
    path: std::path::PathBuf,
}

impl JsonDetectionFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DetectionSource for JsonDetectionFile {
    fn detections(&mut self) -> Result<Vec<FrameDetections>> {
        let contents = std::fs::read_to_string(&self.path)?;
        let mut frames: Vec<FrameDetections> = serde_json::from_str(&contents)?;

        // Enforce the single-ball contract: the ball always lives under
        // the reserved id, and at most one per frame survives.
        for (frame_num, detections) in frames.iter_mut().enumerate() {
            let mut ball_seen = false;
            detections.retain_mut(|d| {
                if d.class != DetectionClass::Ball {
                    return true;
                }
                if ball_seen {
                    warn!(
                        "frame {}: dropping extra ball detection (id {})",
                        frame_num, d.track_id
                    );
                    return false;
                }
                ball_seen = true;
                if d.track_id != BALL_TRACK_ID {
                    debug!(
                        "frame {}: remapping ball id {} -> {}",
                        frame_num, d.track_id, BALL_TRACK_ID
                    );
                    d.track_id = BALL_TRACK_ID;
                }
                true
            });
        }

        Ok(frames)
    }
}
