// src/camera/features.rs
//
// Shi-Tomasi corner detection on raw grayscale data, restricted to the
// configured background margin bands. Corner score is the minimum
// eigenvalue of the Sobel structure tensor summed over a small window;
// candidates below `quality_level` of the strongest corner are dropped,
// then a greedy minimum-distance suppression keeps the strongest
// features up to `max_features`.

use crate::types::{GrayFrame, Point2};

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub max_features: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    /// Side of the square window the structure tensor is summed over.
    pub block_size: usize,
    /// Vertical bands `[x_start, x_end)` where detection is allowed.
    pub bands: Vec<[usize; 2]>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: 100,
            quality_level: 0.3,
            min_distance: 3.0,
            block_size: 7,
            bands: vec![[0, 20], [900, 1050]],
        }
    }
}

struct Candidate {
    point: Point2,
    score: f32,
}

/// Detect up to `max_features` corners inside the margin bands.
pub fn detect_features(gray: &GrayFrame, config: &FeatureConfig) -> Vec<Point2> {
    let half = config.block_size / 2;
    // Need one pixel of margin for the Sobel kernel plus the window.
    let border = half + 1;
    if gray.width <= 2 * border || gray.height <= 2 * border {
        return Vec::new();
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut max_score = 0.0f32;

    for band in &config.bands {
        let x_start = band[0].max(border);
        let x_end = band[1].min(gray.width - border);
        if x_start >= x_end {
            continue;
        }

        for y in border..gray.height - border {
            for x in x_start..x_end {
                let score = min_eigenvalue(gray, x, y, half);
                if score > 0.0 {
                    candidates.push(Candidate {
                        point: Point2::new(x as f32, y as f32),
                        score,
                    });
                    if score > max_score {
                        max_score = score;
                    }
                }
            }
        }
    }

    if candidates.is_empty() {
        return Vec::new();
    }

    let threshold = max_score * config.quality_level;
    candidates.retain(|c| c.score >= threshold);
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    // Greedy suppression: strongest first, drop anything too close to
    // an already accepted feature.
    let min_dist_sq = config.min_distance * config.min_distance;
    let mut accepted: Vec<Point2> = Vec::with_capacity(config.max_features);
    for candidate in candidates {
        if accepted.len() >= config.max_features {
            break;
        }
        let too_close = accepted.iter().any(|p| {
            let dx = p.x - candidate.point.x;
            let dy = p.y - candidate.point.y;
            dx * dx + dy * dy < min_dist_sq
        });
        if !too_close {
            accepted.push(candidate.point);
        }
    }

    accepted
}

/// Minimum eigenvalue of the structure tensor at (x, y), summed over a
/// (2*half+1)^2 window of Sobel gradients.
fn min_eigenvalue(gray: &GrayFrame, x: usize, y: usize, half: usize) -> f32 {
    let mut sum_xx = 0.0f32;
    let mut sum_yy = 0.0f32;
    let mut sum_xy = 0.0f32;

    for wy in y - half..=y + half {
        for wx in x - half..=x + half {
            let (gx, gy) = sobel(gray, wx, wy);
            sum_xx += gx * gx;
            sum_yy += gy * gy;
            sum_xy += gx * gy;
        }
    }

    let trace = sum_xx + sum_yy;
    let diff = sum_xx - sum_yy;
    let discriminant = (diff * diff + 4.0 * sum_xy * sum_xy).sqrt();
    (trace - discriminant) / 2.0
}

#[inline]
fn sobel(gray: &GrayFrame, x: usize, y: usize) -> (f32, f32) {
    let p = |dx: i32, dy: i32| -> f32 {
        gray.pixel((x as i32 + dx) as usize, (y as i32 + dy) as usize) as f32
    };

    let gx = -p(-1, -1) - 2.0 * p(-1, 0) - p(-1, 1) + p(1, -1) + 2.0 * p(1, 0) + p(1, 1);
    let gy = -p(-1, -1) - 2.0 * p(0, -1) - p(1, -1) + p(-1, 1) + 2.0 * p(0, 1) + p(1, 1);
    (gx, gy)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame with a bright square whose corners are strong features.
    fn frame_with_square(width: usize, height: usize, x0: usize, y0: usize) -> GrayFrame {
        let mut data = vec![30u8; width * height];
        for y in y0..y0 + 12 {
            for x in x0..x0 + 12 {
                data[y * width + x] = 220;
            }
        }
        GrayFrame::new(data, width, height)
    }

    fn band_config(bands: Vec<[usize; 2]>) -> FeatureConfig {
        FeatureConfig {
            bands,
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn test_finds_corners_of_square() {
        let gray = frame_with_square(120, 120, 20, 40);
        let features = detect_features(&gray, &band_config(vec![[0, 120]]));
        assert!(!features.is_empty());

        // All features should sit near the square's boundary.
        for f in &features {
            let near_x = f.x >= 14.0 && f.x <= 38.0;
            let near_y = f.y >= 34.0 && f.y <= 58.0;
            assert!(near_x && near_y, "feature off the square: {:?}", f);
        }
    }

    #[test]
    fn test_band_restriction_excludes_outside_corners() {
        // Square at x=60, band only covers x < 40: nothing detectable.
        let gray = frame_with_square(120, 120, 60, 40);
        let features = detect_features(&gray, &band_config(vec![[0, 40]]));
        assert!(features.is_empty());
    }

    #[test]
    fn test_flat_frame_has_no_features() {
        let gray = GrayFrame::new(vec![100u8; 100 * 100], 100, 100);
        let features = detect_features(&gray, &band_config(vec![[0, 100]]));
        assert!(features.is_empty());
    }

    #[test]
    fn test_max_features_cap() {
        let mut data = vec![0u8; 200 * 200];
        // Checkerboard: corners everywhere.
        for y in 0..200 {
            for x in 0..200 {
                if (x / 8 + y / 8) % 2 == 0 {
                    data[y * 200 + x] = 255;
                }
            }
        }
        let gray = GrayFrame::new(data, 200, 200);
        let config = FeatureConfig {
            max_features: 10,
            bands: vec![[0, 200]],
            ..FeatureConfig::default()
        };
        let features = detect_features(&gray, &config);
        assert!(features.len() <= 10);
        assert!(!features.is_empty());
    }
}
