// src/camera/mod.rs
//
// Camera motion compensation: background corner features in the frame
// margins, sparse SAD flow between consecutive frames, and a two-state
// tracking/reacquire estimator producing one displacement per frame.

pub mod estimator;
pub mod features;
pub mod flow;

pub use estimator::{CameraMotionEstimator, MotionState};
pub use features::{detect_features, FeatureConfig};
pub use flow::{track_features, FlowConfig, FlowMatch};
