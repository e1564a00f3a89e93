// src/camera/flow.rs
//
// Sparse feature tracking between two grayscale frames using SAD block
// matching: for each feature, search a bounded window around its old
// location for the patch with the lowest sum of absolute differences,
// then refine to sub-pixel with a parabolic fit along each axis. A
// feature whose best match is a poor fit, or not clearly better than
// the rest of the search window, counts as lost rather than a
// correspondence.

use crate::types::{GrayFrame, Point2};

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Half-size of the square comparison patch.
    pub patch_radius: usize,
    /// Search window radius in pixels, both axes.
    pub search_radius: usize,
    /// Mean per-pixel SAD above which the best match is rejected.
    pub max_residual: f32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            patch_radius: 7,
            search_radius: 15,
            max_residual: 20.0,
        }
    }
}

/// A successfully tracked feature correspondence.
#[derive(Debug, Clone, Copy)]
pub struct FlowMatch {
    pub from: Point2,
    pub to: Point2,
}

impl FlowMatch {
    /// Manhattan (L1) displacement of this correspondence.
    pub fn l1_displacement(&self) -> f32 {
        (self.to.x - self.from.x).abs() + (self.to.y - self.from.y).abs()
    }

    pub fn displacement(&self) -> Point2 {
        Point2::new(self.to.x - self.from.x, self.to.y - self.from.y)
    }
}

/// Track `features` from `prev` into `curr`. Lost features are simply
/// absent from the result.
pub fn track_features(
    prev: &GrayFrame,
    curr: &GrayFrame,
    features: &[Point2],
    config: &FlowConfig,
) -> Vec<FlowMatch> {
    let mut matches = Vec::with_capacity(features.len());
    for &feature in features {
        if let Some(to) = track_one(prev, curr, feature, config) {
            matches.push(FlowMatch { from: feature, to });
        }
    }
    matches
}

fn track_one(
    prev: &GrayFrame,
    curr: &GrayFrame,
    feature: Point2,
    config: &FlowConfig,
) -> Option<Point2> {
    let r = config.patch_radius as i32;
    let fx = feature.x.round() as i32;
    let fy = feature.y.round() as i32;

    // Reference patch must be fully inside the previous frame.
    if fx - r < 0
        || fy - r < 0
        || fx + r >= prev.width as i32
        || fy + r >= prev.height as i32
    {
        return None;
    }

    let sr = config.search_radius as i32;
    let span = (2 * sr + 1) as usize;
    let patch_pixels = ((2 * r + 1) * (2 * r + 1)) as f32;

    // SAD over the whole search window; u32::MAX marks candidates whose
    // patch would leave the frame.
    let mut sads = vec![u32::MAX; span * span];
    let mut best_sad = u32::MAX;
    let mut best_dx = 0i32;
    let mut best_dy = 0i32;

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            let cx = fx + dx;
            let cy = fy + dy;
            if cx - r < 0
                || cy - r < 0
                || cx + r >= curr.width as i32
                || cy + r >= curr.height as i32
            {
                continue;
            }
            let sad = sad_patch(prev, curr, fx, fy, cx, cy, r);
            sads[(dy + sr) as usize * span + (dx + sr) as usize] = sad;
            if sad < best_sad {
                best_sad = sad;
                best_dx = dx;
                best_dy = dy;
            }
        }
    }

    if best_sad == u32::MAX {
        return None;
    }
    if best_sad as f32 / patch_pixels > config.max_residual {
        return None;
    }

    // Ambiguity rejection: the minimum must clearly beat every candidate
    // outside its immediate neighborhood. A patch that matches several
    // places (periodic texture, repeated background) carries no motion
    // information and must count as lost.
    let mut second_best = u32::MAX;
    for dy in -sr..=sr {
        for dx in -sr..=sr {
            if (dx - best_dx).abs() <= 1 && (dy - best_dy).abs() <= 1 {
                continue;
            }
            let sad = sads[(dy + sr) as usize * span + (dx + sr) as usize];
            if sad < second_best {
                second_best = sad;
            }
        }
    }
    if second_best != u32::MAX && best_sad as f32 >= 0.8 * second_best as f32 {
        return None;
    }

    // An exact match cannot be improved by refinement.
    if best_sad == 0 {
        return Some(Point2::new(
            feature.x + best_dx as f32,
            feature.y + best_dy as f32,
        ));
    }

    // Parabolic sub-pixel refinement along each axis, only when the
    // neighbors inside the search window are available.
    let sad_at = |dx: i32, dy: i32| -> Option<u32> {
        if dx.abs() > sr || dy.abs() > sr {
            return None;
        }
        let sad = sads[(dy + sr) as usize * span + (dx + sr) as usize];
        (sad != u32::MAX).then_some(sad)
    };

    let refine = |minus: Option<u32>, center: u32, plus: Option<u32>| -> f32 {
        match (minus, plus) {
            (Some(m), Some(p)) => parabolic_offset(m as f32, center as f32, p as f32),
            _ => 0.0,
        }
    };

    let sub_x = refine(sad_at(best_dx - 1, best_dy), best_sad, sad_at(best_dx + 1, best_dy));
    let sub_y = refine(sad_at(best_dx, best_dy - 1), best_sad, sad_at(best_dx, best_dy + 1));

    Some(Point2::new(
        feature.x + best_dx as f32 + sub_x,
        feature.y + best_dy as f32 + sub_y,
    ))
}

/// SAD between the patch at (rx, ry) in `prev` and (cx, cy) in `curr`.
#[inline]
fn sad_patch(
    prev: &GrayFrame,
    curr: &GrayFrame,
    rx: i32,
    ry: i32,
    cx: i32,
    cy: i32,
    radius: i32,
) -> u32 {
    let mut sum: u32 = 0;
    for dy in -radius..=radius {
        let p_row = ((ry + dy) as usize) * prev.width + (rx - radius) as usize;
        let c_row = ((cy + dy) as usize) * curr.width + (cx - radius) as usize;
        let span = (2 * radius + 1) as usize;
        for i in 0..span {
            let diff = prev.data[p_row + i] as i32 - curr.data[c_row + i] as i32;
            sum += diff.unsigned_abs();
        }
    }
    sum
}

/// Vertex offset in [-0.5, 0.5] of the parabola through three equally
/// spaced SAD samples.
fn parabolic_offset(minus: f32, center: f32, plus: f32) -> f32 {
    let denom = minus - 2.0 * center + plus;
    if denom.abs() < 1e-6 {
        return 0.0;
    }
    let offset = 0.5 * (minus - plus) / denom;
    offset.clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textured frame shifted by (shift_x, shift_y), generated from a
    /// deterministic hash so every patch is distinctive.
    fn textured_frame(width: usize, height: usize, shift_x: i32, shift_y: i32) -> GrayFrame {
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let sx = (x as i32 - shift_x).rem_euclid(width as i32) as usize;
                let sy = (y as i32 - shift_y).rem_euclid(height as i32) as usize;
                let v = (sx.wrapping_mul(31) ^ sy.wrapping_mul(17)) % 251;
                data[y * width + x] = v as u8;
            }
        }
        GrayFrame::new(data, width, height)
    }

    #[test]
    fn test_tracks_known_shift() {
        let prev = textured_frame(128, 96, 0, 0);
        let curr = textured_frame(128, 96, 6, 3);
        let features = vec![Point2::new(40.0, 40.0), Point2::new(70.0, 50.0)];

        let matches = track_features(&prev, &curr, &features, &FlowConfig::default());
        assert_eq!(matches.len(), 2);
        for m in &matches {
            // Exact content shift: the zero-residual match is returned
            // as-is, no sub-pixel adjustment.
            let d = m.displacement();
            assert!((d.x - 6.0).abs() < 1e-4, "dx = {}", d.x);
            assert!((d.y - 3.0).abs() < 1e-4, "dy = {}", d.y);
        }
    }

    #[test]
    fn test_zero_shift_yields_zero_displacement() {
        let frame = textured_frame(128, 96, 0, 0);
        let features = vec![Point2::new(64.0, 48.0)];

        let matches = track_features(&frame, &frame, &features, &FlowConfig::default());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].l1_displacement(), 0.0);
    }

    #[test]
    fn test_periodic_texture_is_ambiguous_and_dropped() {
        // Vertical stripes repeat every 8 px: the patch matches equally
        // well at many displacements, so no single correspondence is
        // trustworthy and the feature counts as lost.
        let mut data = vec![0u8; 128 * 96];
        for y in 0..96 {
            for x in 0..128 {
                data[y * 128 + x] = if (x / 4) % 2 == 0 { 200 } else { 40 };
            }
        }
        let frame = GrayFrame::new(data, 128, 96);
        let features = vec![Point2::new(64.0, 48.0)];

        let matches = track_features(&frame, &frame, &features, &FlowConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_feature_near_border_is_dropped() {
        let prev = textured_frame(64, 64, 0, 0);
        let curr = textured_frame(64, 64, 2, 0);
        let features = vec![Point2::new(1.0, 1.0)];

        let matches = track_features(&prev, &curr, &features, &FlowConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_unmatchable_content_is_lost() {
        let prev = textured_frame(128, 96, 0, 0);
        // Flat frame: best SAD stays high everywhere.
        let curr = GrayFrame::new(vec![128u8; 128 * 96], 128, 96);
        let features = vec![Point2::new(64.0, 48.0)];

        let config = FlowConfig {
            max_residual: 10.0,
            ..FlowConfig::default()
        };
        let matches = track_features(&prev, &curr, &features, &config);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_l1_displacement() {
        let m = FlowMatch {
            from: Point2::new(10.0, 10.0),
            to: Point2::new(13.0, 6.0),
        };
        assert_eq!(m.l1_displacement(), 7.0);
    }
}
