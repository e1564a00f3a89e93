// src/track_store.rs
//
// Stage 1: normalize raw per-frame detections into the frame-aligned
// TrackStore. Purely structural — the only geometry added here is the
// per-record anchor point (ball: bbox center, others: foot point).
//
// The detector's output length may disagree with the container's frame
// count (dropped frames, trailing garbage), so the store is padded with
// empty frames or truncated to exactly `total_frames`. Both events are
// counted; they indicate detector/container disagreement worth logging.

use crate::detection::{DetectionClass, FrameDetections};
use crate::types::{ObjectClass, TrackRecord, TrackStore, BALL_TRACK_ID};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Empty frames appended because the detector emitted too few.
    pub padded_frames: usize,
    /// Trailing detector frames discarded beyond `total_frames`.
    pub truncated_frames: usize,
}

pub struct TrackNormalizer;

impl TrackNormalizer {
    /// Build a frame-aligned store from raw detections. The returned
    /// store satisfies the length invariant for every class.
    pub fn normalize(
        raw_frames: &[FrameDetections],
        total_frames: usize,
    ) -> (TrackStore, NormalizeStats) {
        let mut store = TrackStore::with_frames(total_frames);
        let mut stats = NormalizeStats::default();

        for (frame_num, detections) in raw_frames.iter().enumerate() {
            if frame_num >= total_frames {
                stats.truncated_frames = raw_frames.len() - total_frames;
                break;
            }
            for detection in detections {
                match detection.class {
                    DetectionClass::Player => {
                        store.players[frame_num].insert(
                            detection.track_id,
                            TrackRecord::new(ObjectClass::Player, detection.bbox),
                        );
                    }
                    DetectionClass::Referee => {
                        store.referees[frame_num].insert(
                            detection.track_id,
                            TrackRecord::new(ObjectClass::Referee, detection.bbox),
                        );
                    }
                    // The ball always lives under the reserved id,
                    // whatever id the backend emitted; the first
                    // detection in a frame wins.
                    DetectionClass::Ball => {
                        store.ball[frame_num]
                            .entry(BALL_TRACK_ID)
                            .or_insert_with(|| TrackRecord::new(ObjectClass::Ball, detection.bbox));
                    }
                }
            }
        }

        if raw_frames.len() < total_frames {
            stats.padded_frames = total_frames - raw_frames.len();
        }

        if stats.padded_frames > 0 || stats.truncated_frames > 0 {
            warn!(
                "detector/container length mismatch: padded {} frame(s), truncated {} frame(s)",
                stats.padded_frames, stats.truncated_frames
            );
        }

        (store, stats)
    }
}
