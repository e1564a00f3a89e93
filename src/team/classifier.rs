// src/team/classifier.rs
//
// Stage 6: team assignment from shirt color. One reference frame
// (conventionally frame 0) is sampled: each player's color descriptor
// comes from the upper half of its bbox, where the shirt dominates.
// Within that region a two-way pixel clustering separates shirt from
// background; the cluster holding the region's four corners (majority
// vote) is assumed to be background, and the other centroid is the
// shirt color. All shirt colors are then clustered into the two team
// centroids.
//
// Every cache here is per-instance state, one instance per video, so
// parallel videos never share classifier state.

use super::clusterer::{Clusters, TwoWayClusterer};
use crate::config::TeamConfig;
use crate::types::{Bbox, ColorRgb, Frame, FrameTracks, TrackId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Regions smaller than this many pixels get a plain mean color
/// instead of clustering.
const MIN_CLUSTER_PIXELS: usize = 10;

pub struct TeamClassifier {
    clusterer: Box<dyn TwoWayClusterer>,
    /// Fitted team model; `None` after the default-color fallback.
    team_model: Option<Clusters>,
    team_colors: [ColorRgb; 2],
    /// Populated once per player id, never recomputed: the track id's
    /// identity is assumed stable for its lifetime.
    player_team: HashMap<TrackId, u8>,
    player_color: HashMap<TrackId, ColorRgb>,
    overrides: HashMap<TrackId, u8>,
}

impl TeamClassifier {
    pub fn new(config: &TeamConfig, clusterer: Box<dyn TwoWayClusterer>) -> Self {
        Self {
            clusterer,
            team_model: None,
            team_colors: config.default_colors,
            player_team: HashMap::new(),
            player_color: HashMap::new(),
            overrides: config.overrides.clone(),
        }
    }

    /// Team centroid for a team id (1 or 2).
    pub fn team_color(&self, team: u8) -> ColorRgb {
        self.team_colors[(team.clamp(1, 2) - 1) as usize]
    }

    /// True when the reference frame could not support clustering and
    /// team assignment fell back to the configured default colors.
    pub fn used_default_colors(&self) -> bool {
        self.team_model.is_none()
    }

    /// Fit the two team centroids from the reference frame's players.
    pub fn fit_reference(&mut self, frame: &Frame, players: &FrameTracks) {
        let mut ids: Vec<TrackId> = players.keys().copied().collect();
        ids.sort_unstable();

        let mut colors: Vec<ColorRgb> = Vec::with_capacity(ids.len());
        for &player_id in &ids {
            let color = self.player_shirt_color(frame, &players[&player_id].bbox, player_id);
            colors.push(color);
        }

        let Some(clusters) = (colors.len() >= 2)
            .then(|| self.clusterer.fit(&colors))
            .flatten()
        else {
            warn!(
                "team assignment unreliable: {} player sample(s) in reference frame, using default colors",
                colors.len()
            );
            self.team_model = None;
            return;
        };

        self.team_colors = clusters.centroids;
        // Pre-populate teams for the players seen in the reference frame.
        for (&player_id, color) in ids.iter().zip(&colors) {
            let team = clusters.predict(color) + 1;
            self.player_team.insert(player_id, team);
        }
        self.team_model = Some(clusters);
        debug!(
            "team centroids: {:?} / {:?}",
            self.team_colors[0], self.team_colors[1]
        );
    }

    /// Team id (1 or 2) for a player, cached permanently per id.
    pub fn team_of(&mut self, frame: &Frame, bbox: &Bbox, player_id: TrackId) -> u8 {
        if let Some(&team) = self.player_team.get(&player_id) {
            return team;
        }

        let team = if let Some(&forced) = self.overrides.get(&player_id) {
            forced.clamp(1, 2)
        } else {
            let color = self.player_shirt_color(frame, bbox, player_id);
            match &self.team_model {
                Some(clusters) => clusters.predict(&color) + 1,
                // Fallback model: nearest default centroid.
                None => {
                    let d1 = distance_sq(&color, &self.team_colors[0]);
                    let d2 = distance_sq(&color, &self.team_colors[1]);
                    if d2 < d1 {
                        2
                    } else {
                        1
                    }
                }
            }
        };

        self.player_team.insert(player_id, team);
        team
    }

    /// Shirt color for one player, cached per id. Degenerate or fully
    /// out-of-bounds boxes produce black rather than an error.
    fn player_shirt_color(&mut self, frame: &Frame, bbox: &Bbox, player_id: TrackId) -> ColorRgb {
        if let Some(&color) = self.player_color.get(&player_id) {
            return color;
        }
        let color = sample_shirt_color(frame, bbox, self.clusterer.as_ref());
        self.player_color.insert(player_id, color);
        color
    }
}

/// Sample the shirt color from the top half of a bbox.
fn sample_shirt_color(frame: &Frame, bbox: &Bbox, clusterer: &dyn TwoWayClusterer) -> ColorRgb {
    // A box entirely outside the frame has no pixels to sample.
    if bbox[0] >= frame.width as f32
        || bbox[1] >= frame.height as f32
        || bbox[2] <= 0.0
        || bbox[3] <= 0.0
    {
        return [0.0, 0.0, 0.0];
    }

    // Clip to frame bounds.
    let x1 = (bbox[0].max(0.0) as usize).min(frame.width.saturating_sub(1));
    let x2 = (bbox[2].max(0.0) as usize).min(frame.width);
    let y1 = (bbox[1].max(0.0) as usize).min(frame.height.saturating_sub(1));
    let y2 = (bbox[3].max(0.0) as usize).min(frame.height);

    if x2 <= x1 || y2 <= y1 {
        return [0.0, 0.0, 0.0];
    }

    // Upper half of the clipped box, at least one row.
    let half_h = ((y2 - y1) / 2).max(1);
    let region_w = x2 - x1;
    let region_h = half_h;

    let mut pixels: Vec<ColorRgb> = Vec::with_capacity(region_w * region_h);
    for y in y1..y1 + region_h {
        for x in x1..x2 {
            pixels.push(frame.pixel_rgb(x, y));
        }
    }

    if pixels.is_empty() {
        return [0.0, 0.0, 0.0];
    }
    if pixels.len() < MIN_CLUSTER_PIXELS {
        return mean_color(&pixels);
    }

    let Some(clusters) = clusterer.fit(&pixels) else {
        return mean_color(&pixels);
    };

    // Corner vote: the cluster owning most of the region's four corners
    // is background; the shirt is the other one.
    let corner_indices = [
        0,
        region_w - 1,
        (region_h - 1) * region_w,
        region_h * region_w - 1,
    ];
    let corner_votes: u8 = corner_indices
        .iter()
        .map(|&i| clusters.labels[i])
        .sum();
    let background = u8::from(corner_votes >= 2);
    let shirt = 1 - background;

    clusters.centroids[shirt as usize]
}

fn mean_color(pixels: &[ColorRgb]) -> ColorRgb {
    let mut mean = [0.0f32; 3];
    for p in pixels {
        for c in 0..3 {
            mean[c] += p[c];
        }
    }
    for c in &mut mean {
        *c /= pixels.len() as f32;
    }
    mean
}

#[inline]
fn distance_sq(a: &ColorRgb, b: &ColorRgb) -> f32 {
    let mut sum = 0.0;
    for c in 0..3 {
        let d = a[c] - b[c];
        sum += d * d;
    }
    sum
}
