// src/pipeline.rs
//
// Orchestrator wiring the seven stages in order over one recording.
// The TrackStore is the single mutable aggregate: stages 3-6 mutate it
// in place, stage 7 reads it to emit the possession record. A failure
// anywhere aborts this recording with no partial outputs; the batch
// driver decides whether to continue with others.
//
// Stage order and field contract:
//
//   1 normalize      -> bbox, position
//   2 ball smoothing -> dense ball bbox/position
//   3 camera         -> position_adjusted (requires position)
//   4 court          -> position_transformed (requires position_adjusted)
//   5 kinematics     -> speed, distance (requires position_transformed)
//   6 teams          -> team, team_color
//   7 possession     -> has_ball + possession record (requires team)

use crate::ball_path::BallPathSmoother;
use crate::cache::{ArtifactCache, ArtifactKind, Fingerprint};
use crate::camera::CameraMotionEstimator;
use crate::config::Config;
use crate::court::CourtProjector;
use crate::detection::FrameDetections;
use crate::error::{PipelineError, Result};
use crate::kinematics::KinematicsEstimator;
use crate::possession::{PossessionResolver, TeamStreaks};
use crate::summary::{MatchSummary, QualityReport};
use crate::team::{KMeansClusterer, TeamClassifier};
use crate::track_store::{NormalizeStats, TrackNormalizer};
use crate::types::{CameraMovement, Frame, PossessionRecord, TrackStore};
use crate::video::FrameSource;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug)]
pub struct PipelineOutput {
    pub tracks: TrackStore,
    pub camera_movement: CameraMovement,
    pub possession: PossessionRecord,
    pub streaks: TeamStreaks,
    pub summary: MatchSummary,
}

pub struct Pipeline {
    config: Config,
    cache: Option<ArtifactCache>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ArtifactCache::new(&config.cache.dir));
        Self { config, cache }
    }

    /// Process one recording end to end. `recording` keys the cache
    /// artifacts; `fingerprint` is the content identity of the
    /// detections export stage 1 memoizes. The camera artifact is
    /// fingerprinted from the decoded frames instead, since it is
    /// computed from them.
    pub fn run(
        &self,
        recording: &str,
        source: &mut dyn FrameSource,
        detections: &[FrameDetections],
        fingerprint: &Fingerprint,
    ) -> Result<PipelineOutput> {
        let info = source.info().clone();
        if info.total_frames == 0 {
            return Err(PipelineError::EmptyVideo {
                path: PathBuf::from(recording),
            });
        }
        let frames = source.read_all()?;
        if frames.is_empty() {
            return Err(PipelineError::EmptyVideo {
                path: PathBuf::from(recording),
            });
        }

        // Stage 1: frame-aligned store. Only the store itself is cached;
        // a cache hit implies zero pad/truncate counters for this run.
        let mut quality = QualityReport::default();
        let mut stats = NormalizeStats::default();
        let mut tracks = match &self.cache {
            Some(cache) => cache.load_or_else(recording, ArtifactKind::Tracks, fingerprint, || {
                let (store, fresh_stats) = TrackNormalizer::normalize(detections, info.total_frames);
                stats = fresh_stats;
                store
            }),
            None => {
                let (store, fresh_stats) = TrackNormalizer::normalize(detections, info.total_frames);
                stats = fresh_stats;
                store
            }
        };
        quality.padded_frames = stats.padded_frames;
        quality.truncated_frames = stats.truncated_frames;
        info!("tracks normalized: {} frame(s)", tracks.total_frames());

        // Stage 2: dense ball path.
        let ball_report = BallPathSmoother::smooth(&mut tracks.ball);
        quality.ball_track_empty = ball_report.empty_track;
        if ball_report.filled_frames > 0 {
            info!("ball path: {} frame(s) interpolated", ball_report.filled_frames);
        }

        // Stage 3: camera motion + compensation. Keyed on frame content:
        // re-exported frames must invalidate the artifact even when the
        // detections file is unchanged.
        let camera_movement = match &self.cache {
            Some(cache) => {
                let frames_fp = frames_fingerprint(&frames);
                cache.load_or_else(recording, ArtifactKind::CameraMovement, &frames_fp, || {
                    CameraMotionEstimator::new(&self.config.camera).estimate(&frames)
                })
            }
            None => CameraMotionEstimator::new(&self.config.camera).estimate(&frames),
        };
        CameraMotionEstimator::adjust_positions(&mut tracks, &camera_movement);

        // Stage 4: court projection.
        let projector = CourtProjector::new(&self.config.court)?;
        projector.apply(&mut tracks);

        // Stage 5: speed and distance.
        KinematicsEstimator::new(self.config.kinematics.window_frames, info.fps)
            .apply(&mut tracks);

        // Stage 6: team classification from the reference frame.
        let mut classifier = TeamClassifier::new(
            &self.config.team,
            Box::new(KMeansClusterer::new(self.config.team.kmeans_seed)),
        );
        classifier.fit_reference(&frames[0], &tracks.players[0]);
        if classifier.used_default_colors() {
            warn!("{}: team colors fell back to defaults", recording);
        }
        for frame_num in 0..tracks.total_frames() {
            let Some(frame) = frames.get(frame_num) else {
                break;
            };
            let ids: Vec<_> = tracks.players[frame_num].keys().copied().collect();
            for player_id in ids {
                let bbox = tracks.players[frame_num][&player_id].bbox;
                let team = classifier.team_of(frame, &bbox, player_id);
                if let Some(record) = tracks.players[frame_num].get_mut(&player_id) {
                    record.team = Some(team);
                    record.team_color = Some(classifier.team_color(team));
                }
            }
        }

        // Stage 7: possession.
        let resolver = PossessionResolver::new(self.config.possession.max_player_ball_distance);
        let (possession, streaks) = resolver.resolve(&mut tracks);

        let summary = MatchSummary::build(&tracks, &possession, &streaks, info.fps, quality);
        info!(
            "{}: possession {:.1}% / {:.1}%, {} player(s)",
            recording,
            summary.team1.possession_pct,
            summary.team2.possession_pct,
            summary.players.len()
        );

        Ok(PipelineOutput {
            tracks,
            camera_movement,
            possession,
            streaks,
            summary,
        })
    }
}

/// Content identity of a decoded frame sequence: dimensions plus raw
/// RGB bytes of every frame.
fn frames_fingerprint(frames: &[Frame]) -> Fingerprint {
    let mut hasher = Sha256::new();
    let mut len = 0u64;
    for frame in frames {
        hasher.update((frame.width as u64).to_le_bytes());
        hasher.update((frame.height as u64).to_le_bytes());
        hasher.update(&frame.data);
        len += frame.data.len() as u64;
    }
    Fingerprint {
        len,
        sha256: hasher.finalize().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionClass, RawDetection};
    use crate::types::{Frame, ObjectClass, Point2, BALL_TRACK_ID};
    use crate::video::MemoryFrameSource;

    /// Green frame with two distinctly colored shirt regions.
    fn scene_frame() -> Frame {
        let (width, height) = (200, 120);
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&[40, 160, 40]);
        }
        let mut frame = Frame::new(data, width, height);
        paint(&mut frame, 12, 12, 45, 48, [220, 20, 20]);
        paint(&mut frame, 112, 12, 145, 48, [20, 20, 220]);
        frame
    }

    fn paint(frame: &mut Frame, x1: usize, y1: usize, x2: usize, y2: usize, color: [u8; 3]) {
        for y in y1..y2 {
            for x in x1..x2 {
                let idx = (y * frame.width + x) * 3;
                frame.data[idx] = color[0];
                frame.data[idx + 1] = color[1];
                frame.data[idx + 2] = color[2];
            }
        }
    }

    fn detections(n: usize) -> Vec<FrameDetections> {
        (0..n)
            .map(|_| {
                vec![
                    RawDetection {
                        track_id: 10,
                        class: DetectionClass::Player,
                        bbox: [10.0, 10.0, 50.0, 90.0],
                    },
                    RawDetection {
                        track_id: 11,
                        class: DetectionClass::Player,
                        bbox: [110.0, 10.0, 150.0, 90.0],
                    },
                    RawDetection {
                        track_id: BALL_TRACK_ID,
                        class: DetectionClass::Ball,
                        bbox: [28.0, 86.0, 36.0, 94.0],
                    },
                ]
            })
            .collect()
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.cache.enabled = false;
        // Scale the court landmarks into the synthetic 200x120 frame.
        config.court.pixel_vertices = [
            [10.0, 110.0],
            [30.0, 20.0],
            [120.0, 18.0],
            [190.0, 100.0],
        ];
        config
    }

    #[test]
    fn test_full_pipeline_end_to_end() {
        let frames: Vec<Frame> = (0..6).map(|_| scene_frame()).collect();
        let mut source = MemoryFrameSource::new(frames, 25.0);
        let detections = detections(6);
        let fingerprint = Fingerprint::of_bytes(b"synthetic");

        let pipeline = Pipeline::new(test_config());
        let output = pipeline
            .run("test", &mut source, &detections, &fingerprint)
            .unwrap();

        // Length invariant holds for every class.
        for class in ObjectClass::ALL {
            assert_eq!(output.tracks.class(class).len(), 6);
        }

        // Frame-zero camera movement is always zero.
        assert_eq!(output.camera_movement[0].x, 0.0);
        assert_eq!(output.camera_movement[0].y, 0.0);

        // Stages populated their fields.
        let player = &output.tracks.players[0][&10];
        assert!(player.position_adjusted.is_some());
        assert!(player.position_transformed.is_some());
        assert!(player.team.is_some());
        assert!(player.team_color.is_some());

        // Two kits, two teams.
        let t10 = output.tracks.players[0][&10].team.unwrap();
        let t11 = output.tracks.players[0][&11].team.unwrap();
        assert_ne!(t10, t11);

        // Ball sits at player 10's feet: possession assigned.
        assert_eq!(output.possession.owner[0], Some(10));
        assert_eq!(output.possession.team_control[0], t10);
        assert_eq!(output.possession.owner.len(), 6);

        assert_eq!(output.summary.total_frames, 6);
        assert!(!output.summary.quality.ball_track_empty);
    }

    #[test]
    fn test_detector_shortfall_is_padded_and_counted() {
        let frames: Vec<Frame> = (0..6).map(|_| scene_frame()).collect();
        let mut source = MemoryFrameSource::new(frames, 25.0);
        let detections = detections(4);
        let fingerprint = Fingerprint::of_bytes(b"synthetic");

        let pipeline = Pipeline::new(test_config());
        let output = pipeline
            .run("test", &mut source, &detections, &fingerprint)
            .unwrap();

        assert_eq!(output.tracks.players.len(), 6);
        assert_eq!(output.summary.quality.padded_frames, 2);
        // Ball smoothing back-filled the padded frames.
        assert!(output.tracks.ball_record(5).is_some());
    }

    #[test]
    fn test_empty_video_is_a_hard_failure() {
        let mut source = MemoryFrameSource::new(Vec::new(), 25.0);
        let pipeline = Pipeline::new(test_config());
        let err = pipeline
            .run("test", &mut source, &[], &Fingerprint::of_bytes(b"x"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyVideo { .. }));
    }

    #[test]
    fn test_missing_ball_everywhere_is_surfaced() {
        let frames: Vec<Frame> = (0..4).map(|_| scene_frame()).collect();
        let mut source = MemoryFrameSource::new(frames, 25.0);
        let detections: Vec<FrameDetections> = detections(4)
            .into_iter()
            .map(|frame| {
                frame
                    .into_iter()
                    .filter(|d| d.class != DetectionClass::Ball)
                    .collect()
            })
            .collect();

        let pipeline = Pipeline::new(test_config());
        let output = pipeline
            .run("test", &mut source, &detections, &Fingerprint::of_bytes(b"x"))
            .unwrap();

        assert!(output.summary.quality.ball_track_empty);
        assert!(output.possession.owner.iter().all(|o| o.is_none()));
        assert!(output.possession.team_control.iter().all(|&t| t == 0));
    }

    /// Deterministic textured gray frame, content panned by `shift_x`.
    fn textured_frame(shift_x: i32) -> Frame {
        let (width, height) = (200usize, 120usize);
        let mut data = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let sx = (x as i32 - shift_x).rem_euclid(width as i32) as usize;
                let v = ((sx.wrapping_mul(31) ^ y.wrapping_mul(17)) % 251) as u8;
                let idx = (y * width + x) * 3;
                data[idx] = v;
                data[idx + 1] = v;
                data[idx + 2] = v;
            }
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn test_camera_artifact_keys_on_frame_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.cache.enabled = true;
        config.cache.dir = dir.path().to_string_lossy().into_owned();
        config.camera.margin_bands = vec![[0, 200]];

        // Same detections export for both runs.
        let fingerprint = Fingerprint::of_bytes(b"unchanged detections");
        let pipeline = Pipeline::new(config);

        // First run: static frames, movement caches as all zeros.
        let mut source =
            MemoryFrameSource::new(vec![textured_frame(0), textured_frame(0)], 25.0);
        let first = pipeline
            .run("pan", &mut source, &detections(2), &fingerprint)
            .unwrap();
        assert_eq!(first.camera_movement[1], Point2::new(0.0, 0.0));

        // Second run: re-exported frames with an 8 px pan. The cached
        // zeros must not be served.
        let mut source =
            MemoryFrameSource::new(vec![textured_frame(0), textured_frame(8)], 25.0);
        let second = pipeline
            .run("pan", &mut source, &detections(2), &fingerprint)
            .unwrap();
        assert!(
            second.camera_movement[1].x.abs() > 5.0,
            "movement = {:?}",
            second.camera_movement[1]
        );
    }

    #[test]
    fn test_cached_run_matches_uncached_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.cache.enabled = true;
        config.cache.dir = dir.path().to_string_lossy().into_owned();

        let fingerprint = Fingerprint::of_bytes(b"stable input");
        let pipeline = Pipeline::new(config);

        let run = |pipeline: &Pipeline| {
            let frames: Vec<Frame> = (0..6).map(|_| scene_frame()).collect();
            let mut source = MemoryFrameSource::new(frames, 25.0);
            pipeline
                .run("cached", &mut source, &detections(6), &fingerprint)
                .unwrap()
        };

        let first = run(&pipeline);
        let second = run(&pipeline);

        assert_eq!(first.camera_movement, second.camera_movement);
        assert_eq!(
            first.possession.team_control,
            second.possession.team_control
        );
        assert_eq!(first.summary.players.len(), second.summary.players.len());
    }
}
