// src/lib.rs
//
// footyvision: turns per-frame object detections from football video
// into camera-stabilized, court-scaled trajectories, team labels, and
// possession events. Seven stages run in order over a frame-aligned
// track store; see `pipeline::Pipeline` for the driver.

pub mod ball_path;
pub mod cache;
pub mod camera;
pub mod config;
pub mod court;
pub mod detection;
pub mod error;
pub mod kinematics;
pub mod pipeline;
pub mod possession;
pub mod summary;
pub mod team;
pub mod track_store;
pub mod types;
pub mod video;

pub use config::Config;
pub use error::{CacheError, PipelineError, Result};
pub use pipeline::{Pipeline, PipelineOutput};
