// src/ball_path.rs
//
// Stage 2: fill temporal gaps in the single-ball track. Each of the
// four bbox coordinates is treated independently: frames with an
// observed value anchor a linear interpolation across gaps, and any
// run of missing frames before the first observation is back-filled
// with the first observed value. No forward extrapolation happens
// beyond the last observation either — the last value holds.

use crate::types::{bbox_center, FrameTracks, ObjectClass, TrackRecord, BALL_TRACK_ID};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BallPathReport {
    /// Frames that had no ball detection and were synthesized.
    pub filled_frames: usize,
    /// True when the entire video had no ball detection at all. The
    /// track is left empty in that case; nothing is fabricated.
    pub empty_track: bool,
}

pub struct BallPathSmoother;

impl BallPathSmoother {
    /// Densify the ball track in place. After this call either every
    /// frame holds a ball record, or `empty_track` is set and no frame
    /// does.
    pub fn smooth(ball_frames: &mut [FrameTracks]) -> BallPathReport {
        let n = ball_frames.len();
        let mut report = BallPathReport::default();

        // Pull the observed bboxes out, NaN where absent.
        let mut coords = vec![[f64::NAN; 4]; n];
        for (frame_num, frame) in ball_frames.iter().enumerate() {
            if let Some(record) = frame.get(&BALL_TRACK_ID) {
                for c in 0..4 {
                    coords[frame_num][c] = record.bbox[c] as f64;
                }
            }
        }

        let observed: Vec<usize> = (0..n)
            .filter(|&i| coords[i][0].is_finite())
            .collect();

        if observed.is_empty() {
            if n > 0 {
                warn!("ball track is empty for the whole video; possession will be undefined");
                report.empty_track = true;
            }
            return report;
        }

        for c in 0..4 {
            interpolate_column(&mut coords, c);
        }

        // Write back: replace every frame's ball record with the dense
        // bbox and a recomputed center anchor so downstream stages see
        // consistent geometry for synthesized frames too.
        for (frame_num, frame) in ball_frames.iter_mut().enumerate() {
            if frame.get(&BALL_TRACK_ID).is_none() {
                report.filled_frames += 1;
            }
            let bbox = [
                coords[frame_num][0] as f32,
                coords[frame_num][1] as f32,
                coords[frame_num][2] as f32,
                coords[frame_num][3] as f32,
            ];
            let mut record = TrackRecord::new(ObjectClass::Ball, bbox);
            record.position = bbox_center(&bbox);
            frame.insert(BALL_TRACK_ID, record);
        }

        report
    }
}

/// Linear interpolation across gaps for one coordinate column, with
/// clamped fill before the first and after the last observation.
fn interpolate_column(coords: &mut [[f64; 4]], col: usize) {
    let n = coords.len();
    let anchors: Vec<(usize, f64)> = (0..n)
        .filter(|&i| coords[i][col].is_finite())
        .map(|i| (i, coords[i][col]))
        .collect();

    let (Some(&(first_idx, first_val)), Some(&(last_idx, last_val))) =
        (anchors.first(), anchors.last())
    else {
        return;
    };

    for i in 0..n {
        if coords[i][col].is_finite() {
            continue;
        }
        if i < first_idx {
            coords[i][col] = first_val;
        } else if i > last_idx {
            coords[i][col] = last_val;
        } else {
            // Between two anchors: find the bracketing pair.
            let hi = anchors.partition_point(|&(idx, _)| idx < i);
            let (i0, v0) = anchors[hi - 1];
            let (i1, v1) = anchors[hi];
            let t = (i - i0) as f64 / (i1 - i0) as f64;
            coords[i][col] = v0 + t * (v1 - v0);
        }
    }
}
