// src/possession.rs
//
// Stage 7: per-frame ball possession. The ball's center is compared
// against each player's two bottom bbox corners; the player with the
// smallest such distance wins the frame, but only below the distance
// threshold. Candidates are visited in ascending track-id order so
// distance ties resolve deterministically.
//
// Team aggregation carries the previous frame's team forward through
// unassigned frames (0 until the first assignment ever), and running
// per-team streaks track the longest consecutive possession.

use crate::types::{bbox_center, Bbox, FrameTracks, Point2, PossessionRecord, TrackId, TrackStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TeamStreaks {
    /// Longest consecutive possession per team, in frames.
    pub team1_frames: usize,
    pub team2_frames: usize,
}

impl TeamStreaks {
    pub fn team1_seconds(&self, fps: f64) -> f64 {
        self.team1_frames as f64 / fps.max(1.0)
    }

    pub fn team2_seconds(&self, fps: f64) -> f64 {
        self.team2_frames as f64 / fps.max(1.0)
    }
}

pub struct PossessionResolver {
    max_player_ball_distance: f32,
}

impl PossessionResolver {
    pub fn new(max_player_ball_distance: f32) -> Self {
        Self {
            max_player_ball_distance,
        }
    }

    /// Resolve possession for every frame, marking `has_ball` on the
    /// assigned player's record.
    pub fn resolve(&self, store: &mut TrackStore) -> (PossessionRecord, TeamStreaks) {
        let total_frames = store.total_frames();
        let mut record = PossessionRecord {
            team_control: Vec::with_capacity(total_frames),
            owner: Vec::with_capacity(total_frames),
        };

        let mut cur1 = 0usize;
        let mut cur2 = 0usize;
        let mut streaks = TeamStreaks::default();

        for frame_num in 0..total_frames {
            let ball_bbox = store
                .ball_record(frame_num)
                .map(|r| r.bbox)
                .filter(bbox_is_finite);

            let assigned = ball_bbox
                .and_then(|bbox| self.assign_ball(&store.players[frame_num], &bbox));

            let team = match assigned {
                Some(player_id) => {
                    let player = store.players[frame_num]
                        .get_mut(&player_id)
                        .map(|r| {
                            r.has_ball = true;
                            r.team.unwrap_or(0)
                        })
                        .unwrap_or(0);
                    record.owner.push(Some(player_id));
                    player
                }
                None => {
                    record.owner.push(None);
                    // Carry the previous frame's team forward.
                    record.team_control.last().copied().unwrap_or(0)
                }
            };
            record.team_control.push(team);

            // Streaks: a team's run resets whenever anyone else (or no
            // team) holds the frame.
            match team {
                1 => {
                    cur1 += 1;
                    cur2 = 0;
                    streaks.team1_frames = streaks.team1_frames.max(cur1);
                }
                2 => {
                    cur2 += 1;
                    cur1 = 0;
                    streaks.team2_frames = streaks.team2_frames.max(cur2);
                }
                _ => {
                    cur1 = 0;
                    cur2 = 0;
                }
            }
        }

        debug!(
            "possession: {} of {} frame(s) with an assigned player",
            record.owner.iter().filter(|o| o.is_some()).count(),
            total_frames
        );
        (record, streaks)
    }

    /// The player whose nearer bottom bbox corner is closest to the
    /// ball center, if within threshold.
    fn assign_ball(&self, players: &FrameTracks, ball_bbox: &Bbox) -> Option<TrackId> {
        let ball = bbox_center(ball_bbox);

        let mut ids: Vec<TrackId> = players.keys().copied().collect();
        ids.sort_unstable();

        let mut best: Option<(TrackId, f32)> = None;
        for player_id in ids {
            let bbox = &players[&player_id].bbox;
            let left = Point2::new(bbox[0], bbox[3]).distance_to(ball);
            let right = Point2::new(bbox[2], bbox[3]).distance_to(ball);
            let distance = left.min(right);

            if distance < self.max_player_ball_distance
                && best.map_or(true, |(_, d)| distance < d)
            {
                best = Some((player_id, distance));
            }
        }

        best.map(|(player_id, _)| player_id)
    }
}

fn bbox_is_finite(bbox: &Bbox) -> bool {
    bbox.iter().all(|c| c.is_finite())
}
