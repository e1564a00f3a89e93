// src/camera/estimator.rs
//
// Stage 3: per-frame camera displacement from background feature flow.
//
// The estimator keeps one sparse feature set detected inside the margin
// bands and runs a two-state machine per frame:
//
//   Tracking  — the largest L1 feature displacement stays at or below
//               `min_movement`; record (0,0) and keep the feature set.
//   Reacquire — the largest displacement exceeds the threshold; record
//               that feature's (x,y) displacement and re-detect features
//               on the current frame.
//
// The previous grayscale frame advances every frame regardless of
// branch. Two known limitations: the single most-displaced feature
// stands in for camera motion (a fast foreground object inside a
// margin band can corrupt the estimate), and consecutive sub-threshold
// frames accumulate real, uncorrected drift because compensation is
// per-frame, not cumulative. Tests document both.

use super::features::{detect_features, FeatureConfig};
use super::flow::{track_features, FlowConfig};
use crate::config::CameraConfig;
use crate::types::{CameraMovement, Frame, GrayFrame, ObjectClass, Point2, TrackStore};
use tracing::{debug, info};

/// Explicit per-frame state of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Sub-threshold motion: feature set reused, movement recorded as (0,0).
    Tracking,
    /// Above-threshold motion: movement recorded, feature set refreshed.
    Reacquire,
}

pub struct CameraMotionEstimator {
    feature_config: FeatureConfig,
    flow_config: FlowConfig,
    min_movement: f32,
    features: Vec<Point2>,
    state: MotionState,
}

impl CameraMotionEstimator {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            feature_config: FeatureConfig {
                max_features: config.max_features,
                quality_level: config.quality_level,
                min_distance: config.min_feature_distance,
                block_size: config.corner_block_size,
                bands: config.margin_bands.clone(),
            },
            flow_config: FlowConfig {
                patch_radius: config.flow_patch_radius,
                search_radius: config.flow_search_radius,
                max_residual: config.flow_max_residual,
            },
            min_movement: config.min_movement,
            features: Vec::new(),
            state: MotionState::Tracking,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Estimate camera movement for every frame. Index 0 is always
    /// (0,0) — there is no prior frame to compare against.
    pub fn estimate(&mut self, frames: &[Frame]) -> CameraMovement {
        let mut movement: CameraMovement = Vec::with_capacity(frames.len());
        let Some(first) = frames.first() else {
            return movement;
        };

        let mut old_gray = GrayFrame::from_frame(first);
        self.features = detect_features(&old_gray, &self.feature_config);
        self.state = MotionState::Tracking;
        movement.push(Point2::new(0.0, 0.0));

        debug!("camera: {} background features on frame 0", self.features.len());

        let mut reacquisitions = 0usize;
        for (frame_num, frame) in frames.iter().enumerate().skip(1) {
            let gray = GrayFrame::from_frame(frame);
            movement.push(self.step(frame_num, &old_gray, &gray));
            if self.state == MotionState::Reacquire {
                reacquisitions += 1;
                self.features = detect_features(&gray, &self.feature_config);
            }
            // Advance the reference frame regardless of branch.
            old_gray = gray;
        }

        info!(
            "camera: {} frame(s), {} with measured movement",
            movement.len(),
            reacquisitions
        );
        movement
    }

    /// One frame of the state machine: find the most-displaced tracked
    /// feature and evaluate the transition guard.
    fn step(&mut self, frame_num: usize, prev: &GrayFrame, gray: &GrayFrame) -> Point2 {
        let matches = track_features(prev, gray, &self.features, &self.flow_config);

        let mut max_l1 = 0.0f32;
        let mut movement = Point2::new(0.0, 0.0);
        for m in &matches {
            let l1 = m.l1_displacement();
            if l1 > max_l1 {
                max_l1 = l1;
                movement = m.displacement();
            }
        }

        if max_l1 > self.min_movement {
            self.state = MotionState::Reacquire;
            debug!(
                "frame {}: camera moved ({:.2}, {:.2}), reacquiring features",
                frame_num, movement.x, movement.y
            );
            movement
        } else {
            self.state = MotionState::Tracking;
            Point2::new(0.0, 0.0)
        }
    }

    /// Apply compensation: `position_adjusted = position - movement[frame]`,
    /// independently per object and frame.
    pub fn adjust_positions(store: &mut TrackStore, movement: &CameraMovement) {
        for class in ObjectClass::ALL {
            for (frame_num, frame_tracks) in store.class_mut(class).iter_mut().enumerate() {
                let delta = movement
                    .get(frame_num)
                    .copied()
                    .unwrap_or(Point2::new(0.0, 0.0));
                for record in frame_tracks.values_mut() {
                    record.position_adjusted = Some(Point2::new(
                        record.position.x - delta.x,
                        record.position.y - delta.y,
                    ));
                }
            }
        }
    }
}
