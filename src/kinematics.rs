// src/kinematics.rs
//
// Stage 5: windowed speed and cumulative distance from projected
// trajectories. The frame range is partitioned into fixed-size windows;
// each window's speed is the straight-line distance between its first
// and last projected position divided by the window duration, assigned
// uniformly to every frame inside the window. Trading temporal
// resolution for stability keeps per-frame jitter out of the numbers.
//
// Speed/distance is computed for player tracks; referees and the ball
// are skipped.

use crate::types::{ObjectClass, TrackId, TrackStore};
use std::collections::HashMap;
use tracing::debug;

pub struct KinematicsEstimator {
    window_frames: usize,
    fps: f64,
}

impl KinematicsEstimator {
    pub fn new(window_frames: usize, fps: f64) -> Self {
        Self {
            window_frames: window_frames.max(1),
            fps,
        }
    }

    /// Write `speed` (km/h) and cumulative `distance` (meters) onto
    /// every player record that belongs to a measurable window.
    pub fn apply(&self, store: &mut TrackStore) {
        let total_frames = store.total_frames();
        if total_frames == 0 || self.fps <= 0.0 {
            return;
        }

        let mut cumulative: HashMap<TrackId, f32> = HashMap::new();
        let frames = store.class_mut(ObjectClass::Player);

        for window_start in (0..total_frames).step_by(self.window_frames) {
            let window_end = (window_start + self.window_frames).min(total_frames - 1);
            if window_end <= window_start {
                // Single-sample window: speed 0, no distance increment.
                // A frame already measured as the tail of the previous
                // window keeps its value.
                let track_ids: Vec<TrackId> = frames[window_start].keys().copied().collect();
                for track_id in track_ids {
                    if let Some(record) = frames[window_start].get_mut(&track_id) {
                        let projected =
                            record.position_transformed.map_or(false, |p| p.is_finite());
                        if projected && record.speed.is_none() {
                            record.speed = Some(0.0);
                            record.distance =
                                Some(cumulative.get(&track_id).copied().unwrap_or(0.0));
                        }
                    }
                }
                continue;
            }

            let track_ids: Vec<TrackId> = frames[window_start].keys().copied().collect();
            for track_id in track_ids {
                let start_pos = frames[window_start]
                    .get(&track_id)
                    .and_then(|r| r.position_transformed);
                let end_pos = frames[window_end]
                    .get(&track_id)
                    .and_then(|r| r.position_transformed);

                // Anchor lost at either end: skip this track for this window.
                let (Some(start_pos), Some(end_pos)) = (start_pos, end_pos) else {
                    continue;
                };
                if !start_pos.is_finite() || !end_pos.is_finite() {
                    continue;
                }

                let distance = start_pos.distance_to(end_pos);
                let elapsed = (window_end - window_start) as f64 / self.fps;
                let speed_kmh = (distance as f64 / elapsed * 3.6) as f32;

                let total = cumulative.entry(track_id).or_insert(0.0);
                *total += distance;
                let total = *total;

                for frame_num in window_start..=window_end {
                    if let Some(record) = frames[frame_num].get_mut(&track_id) {
                        record.speed = Some(speed_kmh);
                        record.distance = Some(total);
                    }
                }
            }
        }

        debug!("kinematics: {} player track(s) measured", cumulative.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point2, TrackRecord};

    fn player_at(meters: Point2) -> TrackRecord {
        let mut record = TrackRecord::new(ObjectClass::Player, [0.0, 0.0, 10.0, 20.0]);
        record.position_transformed = Some(meters);
        record
    }

    #[test]
    fn test_ten_meters_over_five_frames_at_25fps() {
        // (0,0) -> (10,0) across a 5-frame window at fps=25:
        // 10 m / 0.2 s = 50 m/s = 180 km/h on every frame of the window.
        let mut store = TrackStore::with_frames(6);
        for frame_num in 0..6 {
            let x = frame_num as f32 * 2.0;
            store.players[frame_num].insert(3, player_at(Point2::new(x, 0.0)));
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);

        for frame_num in 0..=5 {
            let record = &store.players[frame_num][&3];
            assert!(
                (record.speed.unwrap() - 180.0).abs() < 1e-3,
                "frame {}: speed = {:?}",
                frame_num,
                record.speed
            );
        }
        assert!((store.players[5][&3].distance.unwrap() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_distance_accumulates_across_windows() {
        // Two full 5-frame windows, 10 m each.
        let mut store = TrackStore::with_frames(11);
        for frame_num in 0..11 {
            let x = frame_num as f32 * 2.0;
            store.players[frame_num].insert(3, player_at(Point2::new(x, 0.0)));
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);

        let last = &store.players[10][&3];
        assert!((last.distance.unwrap() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_track_missing_at_window_end_is_skipped() {
        let mut store = TrackStore::with_frames(6);
        store.players[0].insert(3, player_at(Point2::new(0.0, 0.0)));
        // Track disappears before the window end.

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert!(store.players[0][&3].speed.is_none());
        assert!(store.players[0][&3].distance.is_none());
    }

    #[test]
    fn test_unprojected_track_is_skipped() {
        let mut store = TrackStore::with_frames(6);
        for frame_num in 0..6 {
            store.players[frame_num]
                .insert(4, TrackRecord::new(ObjectClass::Player, [0.0, 0.0, 5.0, 9.0]));
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert!(store.players[0][&4].speed.is_none());
    }

    #[test]
    fn test_referees_and_ball_are_untouched() {
        let mut store = TrackStore::with_frames(6);
        for frame_num in 0..6 {
            let mut record = TrackRecord::new(ObjectClass::Referee, [0.0, 0.0, 5.0, 9.0]);
            record.position_transformed = Some(Point2::new(frame_num as f32, 0.0));
            store.referees[frame_num].insert(9, record);
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert!(store.referees[0][&9].speed.is_none());
    }

    #[test]
    fn test_single_sample_window_yields_zero_speed() {
        // One frame: the only window has a single sample.
        let mut store = TrackStore::with_frames(1);
        store.players[0].insert(3, player_at(Point2::new(4.0, 4.0)));

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert_eq!(store.players[0][&3].speed, Some(0.0));
        assert_eq!(store.players[0][&3].distance, Some(0.0));
    }

    #[test]
    fn test_trailing_window_keeps_prior_measurement() {
        // Frame 5 closes the first window at 180 km/h and then reopens
        // as a single-sample window, which must not overwrite it.
        let mut store = TrackStore::with_frames(6);
        for frame_num in 0..6 {
            let x = frame_num as f32 * 2.0;
            store.players[frame_num].insert(3, player_at(Point2::new(x, 0.0)));
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert!((store.players[5][&3].speed.unwrap() - 180.0).abs() < 1e-3);
        assert!((store.players[5][&3].distance.unwrap() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_stationary_track_has_zero_speed() {
        let mut store = TrackStore::with_frames(6);
        for frame_num in 0..6 {
            store.players[frame_num].insert(3, player_at(Point2::new(4.0, 4.0)));
        }

        KinematicsEstimator::new(5, 25.0).apply(&mut store);
        assert_eq!(store.players[2][&3].speed, Some(0.0));
        assert_eq!(store.players[5][&3].distance, Some(0.0));
    }
}
