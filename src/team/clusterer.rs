// src/team/clusterer.rs
//
// Minimal two-way clustering capability: fit a sample set into exactly
// two groups and predict the nearest centroid for new samples. The
// production implementation is Lloyd's k-means (k=2) with k-means++
// seeding from a fixed-seed RNG so a given reference frame always
// produces the same centroids. Tests swap in deterministic stubs
// through the trait.

use crate::types::ColorRgb;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A fitted two-group model: the two centroids plus the label each
/// input sample ended up with.
#[derive(Debug, Clone)]
pub struct Clusters {
    pub centroids: [ColorRgb; 2],
    pub labels: Vec<u8>,
}

impl Clusters {
    /// Nearest-centroid label (0 or 1) for a new sample.
    pub fn predict(&self, sample: &ColorRgb) -> u8 {
        let d0 = distance_sq(sample, &self.centroids[0]);
        let d1 = distance_sq(sample, &self.centroids[1]);
        u8::from(d1 < d0)
    }
}

pub trait TwoWayClusterer {
    /// Fit two clusters. Returns `None` when fewer than two distinct
    /// samples are available.
    fn fit(&self, samples: &[ColorRgb]) -> Option<Clusters>;
}

/// Lloyd's k-means with k=2 and seeded k-means++ initialization.
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl KMeansClusterer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            n_init: 3,
            max_iter: 50,
        }
    }

    fn fit_once(&self, samples: &[ColorRgb], rng: &mut ChaCha8Rng) -> (Clusters, f32) {
        // k-means++ seeding: first centroid uniform, second weighted by
        // squared distance to the first.
        let first = samples[rng.gen_range(0..samples.len())];

        let weights: Vec<f32> = samples.iter().map(|s| distance_sq(s, &first)).collect();
        let total: f32 = weights.iter().sum();
        let second = if total <= f32::EPSILON {
            first
        } else {
            let mut pick = rng.gen::<f32>() * total;
            let mut chosen = samples[samples.len() - 1];
            for (sample, w) in samples.iter().zip(&weights) {
                if pick < *w {
                    chosen = *sample;
                    break;
                }
                pick -= w;
            }
            chosen
        };

        let mut centroids = [first, second];
        let mut labels = vec![0u8; samples.len()];

        for _ in 0..self.max_iter {
            let mut changed = false;
            for (i, sample) in samples.iter().enumerate() {
                let label = u8::from(
                    distance_sq(sample, &centroids[1]) < distance_sq(sample, &centroids[0]),
                );
                if labels[i] != label {
                    labels[i] = label;
                    changed = true;
                }
            }

            for k in 0..2 {
                let members: Vec<&ColorRgb> = samples
                    .iter()
                    .zip(&labels)
                    .filter(|(_, &l)| l == k as u8)
                    .map(|(s, _)| s)
                    .collect();
                if !members.is_empty() {
                    let mut mean = [0.0f32; 3];
                    for m in &members {
                        for c in 0..3 {
                            mean[c] += m[c];
                        }
                    }
                    for c in &mut mean {
                        *c /= members.len() as f32;
                    }
                    centroids[k] = mean;
                }
            }

            if !changed {
                break;
            }
        }

        let inertia: f32 = samples
            .iter()
            .zip(&labels)
            .map(|(s, &l)| distance_sq(s, &centroids[l as usize]))
            .sum();

        (Clusters { centroids, labels }, inertia)
    }
}

impl TwoWayClusterer for KMeansClusterer {
    fn fit(&self, samples: &[ColorRgb]) -> Option<Clusters> {
        if samples.len() < 2 {
            return None;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<(Clusters, f32)> = None;

        for _ in 0..self.n_init.max(1) {
            let (clusters, inertia) = self.fit_once(samples, &mut rng);
            match &best {
                Some((_, best_inertia)) if *best_inertia <= inertia => {}
                _ => best = Some((clusters, inertia)),
            }
        }

        best.map(|(clusters, _)| clusters)
    }
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
