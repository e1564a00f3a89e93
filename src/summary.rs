// src/summary.rs
//
// Match summary derived from the finished store and possession record:
// per-player and per-team aggregates plus top performers. This is the
// data handed to report/chart consumers; rendering stays outside.

use crate::possession::TeamStreaks;
use crate::types::{ObjectClass, PossessionRecord, TrackId, TrackStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub team: u8,
    pub avg_speed_kmh: f32,
    pub max_speed_kmh: f32,
    pub distance_m: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamStats {
    /// Share of frames with an assigned team that this team held, in percent.
    pub possession_pct: f32,
    pub total_distance_m: f32,
    /// Mean of the team's player average speeds.
    pub avg_speed_kmh: f32,
    pub longest_possession_seconds: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankedPlayer {
    pub player: TrackId,
    pub value: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub padded_frames: usize,
    pub truncated_frames: usize,
    pub ball_track_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub fps: f64,
    pub total_frames: usize,
    pub players: BTreeMap<TrackId, PlayerStats>,
    pub team1: TeamStats,
    pub team2: TeamStats,
    pub top_distance: Vec<RankedPlayer>,
    pub top_speed: Vec<RankedPlayer>,
    pub quality: QualityReport,
}

impl MatchSummary {
    pub fn build(
        store: &TrackStore,
        possession: &PossessionRecord,
        streaks: &TeamStreaks,
        fps: f64,
        quality: QualityReport,
    ) -> Self {
        let mut speeds: BTreeMap<TrackId, (u8, Vec<f32>, f32)> = BTreeMap::new();

        for frame_tracks in store.class(ObjectClass::Player) {
            for (&player_id, record) in frame_tracks {
                let entry = speeds.entry(player_id).or_insert((0, Vec::new(), 0.0));
                if let Some(team) = record.team {
                    entry.0 = team;
                }
                if let Some(speed) = record.speed {
                    entry.1.push(speed);
                }
                if let Some(distance) = record.distance {
                    entry.2 = entry.2.max(distance);
                }
            }
        }

        let players: BTreeMap<TrackId, PlayerStats> = speeds
            .into_iter()
            .map(|(player_id, (team, speeds, distance))| {
                let avg = if speeds.is_empty() {
                    0.0
                } else {
                    speeds.iter().sum::<f32>() / speeds.len() as f32
                };
                let max = speeds.iter().copied().fold(0.0f32, f32::max);
                (
                    player_id,
                    PlayerStats {
                        team,
                        avg_speed_kmh: avg,
                        max_speed_kmh: max,
                        distance_m: distance,
                    },
                )
            })
            .collect();

        let team_stats = |team: u8| -> TeamStats {
            let members: Vec<&PlayerStats> =
                players.values().filter(|p| p.team == team).collect();
            let assigned = possession
                .team_control
                .iter()
                .filter(|&&t| t != 0)
                .count();
            let held = possession
                .team_control
                .iter()
                .filter(|&&t| t == team)
                .count();

            TeamStats {
                possession_pct: if assigned == 0 {
                    0.0
                } else {
                    held as f32 / assigned as f32 * 100.0
                },
                total_distance_m: members.iter().map(|p| p.distance_m).sum(),
                avg_speed_kmh: if members.is_empty() {
                    0.0
                } else {
                    members.iter().map(|p| p.avg_speed_kmh).sum::<f32>() / members.len() as f32
                },
                longest_possession_seconds: if team == 1 {
                    streaks.team1_seconds(fps)
                } else {
                    streaks.team2_seconds(fps)
                },
            }
        };

        let mut by_distance: Vec<RankedPlayer> = players
            .iter()
            .map(|(&player, stats)| RankedPlayer {
                player,
                value: stats.distance_m,
            })
            .collect();
        by_distance.sort_by(|a, b| b.value.total_cmp(&a.value));
        by_distance.truncate(3);

        let mut by_speed: Vec<RankedPlayer> = players
            .iter()
            .map(|(&player, stats)| RankedPlayer {
                player,
                value: stats.max_speed_kmh,
            })
            .collect();
        by_speed.sort_by(|a, b| b.value.total_cmp(&a.value));
        by_speed.truncate(3);

        Self {
            fps,
            total_frames: store.total_frames(),
            team1: team_stats(1),
            team2: team_stats(2),
            players,
            top_distance: by_distance,
            top_speed: by_speed,
            quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackRecord;

    fn store_with_player(
        player_id: TrackId,
        team: u8,
        speed: f32,
        distance: f32,
        frames: usize,
    ) -> TrackStore {
        let mut store = TrackStore::with_frames(frames);
        for frame_num in 0..frames {
            let mut record = TrackRecord::new(ObjectClass::Player, [0.0, 0.0, 10.0, 20.0]);
            record.team = Some(team);
            record.speed = Some(speed);
            record.distance = Some(distance * (frame_num + 1) as f32 / frames as f32);
            store.players[frame_num].insert(player_id, record);
        }
        store
    }

    fn merge(mut a: TrackStore, b: TrackStore) -> TrackStore {
        for (frame_num, frame_tracks) in b.players.into_iter().enumerate() {
            a.players[frame_num].extend(frame_tracks);
        }
        a
    }

    #[test]
    fn test_player_and_team_aggregates() {
        let store = merge(
            store_with_player(1, 1, 12.0, 100.0, 4),
            store_with_player(2, 2, 20.0, 300.0, 4),
        );
        let possession = PossessionRecord {
            team_control: vec![1, 1, 2, 0],
            owner: vec![Some(1), Some(1), Some(2), None],
        };
        let streaks = TeamStreaks {
            team1_frames: 2,
            team2_frames: 1,
        };

        let summary = MatchSummary::build(
            &store,
            &possession,
            &streaks,
            25.0,
            QualityReport::default(),
        );

        let p1 = &summary.players[&1];
        assert_eq!(p1.team, 1);
        assert!((p1.avg_speed_kmh - 12.0).abs() < 1e-5);
        assert!((p1.distance_m - 100.0).abs() < 1e-5);

        // 3 frames with an assigned team: team 1 held 2 of them.
        assert!((summary.team1.possession_pct - 200.0 / 3.0).abs() < 1e-3);
        assert!((summary.team2.possession_pct - 100.0 / 3.0).abs() < 1e-3);
        assert!((summary.team1.longest_possession_seconds - 0.08).abs() < 1e-9);

        assert_eq!(summary.top_distance[0].player, 2);
        assert_eq!(summary.top_speed[0].player, 2);
    }

    #[test]
    fn test_empty_store_is_all_zeros() {
        let store = TrackStore::with_frames(3);
        let possession = PossessionRecord {
            team_control: vec![0, 0, 0],
            owner: vec![None, None, None],
        };
        let summary = MatchSummary::build(
            &store,
            &possession,
            &TeamStreaks::default(),
            25.0,
            QualityReport::default(),
        );

        assert!(summary.players.is_empty());
        assert_eq!(summary.team1.possession_pct, 0.0);
        assert!(summary.top_distance.is_empty());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let store = store_with_player(1, 1, 10.0, 50.0, 2);
        let possession = PossessionRecord {
            team_control: vec![1, 1],
            owner: vec![Some(1), Some(1)],
        };
        let summary = MatchSummary::build(
            &store,
            &possession,
            &TeamStreaks::default(),
            25.0,
            QualityReport {
                padded_frames: 1,
                truncated_frames: 0,
                ball_track_empty: true,
            },
        );

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"ball_track_empty\":true"));
        assert!(json.contains("\"possession_pct\""));
    }
}
