// src/team/mod.rs
//
// Shirt-color team classification: a swappable two-way clusterer plus
// the per-video classifier that owns the reference-frame model and the
// player caches.

pub mod classifier;
pub mod clusterer;

pub use classifier::TeamClassifier;
pub use clusterer::{Clusters, KMeansClusterer, TwoWayClusterer};
