// src/court.rs
//
// Stage 4: fixed perspective mapping from four pixel-space court
// landmarks to their real-world coordinates in meters. The 3x3
// homography is solved once at construction from the four point
// correspondences (8 equations, 8 unknowns, h33 = 1) and then applied
// to camera-compensated positions in one batched pass over the store.
//
// Points outside the source quadrilateral are extrapolated by the
// transform and carry no accuracy guarantee; callers treat off-court
// projections as low-confidence.

use crate::config::CourtConfig;
use crate::error::{PipelineError, Result};
use crate::types::{ObjectClass, Point2, TrackStore};
use nalgebra::{SMatrix, SVector};
use tracing::debug;

#[derive(Debug)]
pub struct CourtProjector {
    /// Row-major 3x3 homography, pixel -> meters.
    h: [f64; 9],
}

impl CourtProjector {
    pub fn new(config: &CourtConfig) -> Result<Self> {
        Self::from_correspondences(&config.pixel_vertices, &config.court_vertices)
    }

    /// Solve the direct linear system for the homography mapping each
    /// `src` point onto its `dst` counterpart.
    pub fn from_correspondences(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Result<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let (x, y) = (src[i][0] as f64, src[i][1] as f64);
            let (u, v) = (dst[i][0] as f64, dst[i][1] as f64);

            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h8 = a
            .lu()
            .solve(&b)
            .ok_or(PipelineError::DegenerateHomography)?;

        let h = [h8[0], h8[1], h8[2], h8[3], h8[4], h8[5], h8[6], h8[7], 1.0];
        Ok(Self { h })
    }

    /// Project one pixel point into court meters.
    pub fn project_point(&self, p: Point2) -> Point2 {
        let (x, y) = (p.x as f64, p.y as f64);
        let w = self.h[6] * x + self.h[7] * y + self.h[8];
        let u = (self.h[0] * x + self.h[1] * y + self.h[2]) / w;
        let v = (self.h[3] * x + self.h[4] * y + self.h[5]) / w;
        Point2::new(u as f32, v as f32)
    }

    /// Batched projection, preserving order.
    pub fn project(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|&p| self.project_point(p)).collect()
    }

    /// One pass over the store: project every record's adjusted
    /// position, writing `position_transformed`. Records without an
    /// adjusted position (or with non-finite geometry from an empty
    /// ball track) are left untouched.
    pub fn apply(&self, store: &mut TrackStore) {
        let mut points: Vec<Point2> = Vec::new();
        let mut slots: Vec<(ObjectClass, usize, crate::types::TrackId)> = Vec::new();

        for class in ObjectClass::ALL {
            for (frame_num, frame_tracks) in store.class(class).iter().enumerate() {
                for (&track_id, record) in frame_tracks {
                    if let Some(adjusted) = record.position_adjusted {
                        if adjusted.is_finite() {
                            points.push(adjusted);
                            slots.push((class, frame_num, track_id));
                        }
                    }
                }
            }
        }

        let projected = self.project(&points);
        debug!("court: projected {} track positions", projected.len());

        for ((class, frame_num, track_id), meters) in slots.into_iter().zip(projected) {
            if let Some(record) = store.class_mut(class)[frame_num].get_mut(&track_id) {
                record.position_transformed = Some(meters);
            }
        }
    }
}
