// src/lib.rs
//
// Real-time pothole localization core: fuses camera pitch from gyro,
// accelerometer and vision evidence, then back-projects tracked boxes onto
// the road plane to get metric distance and lateral offset.

pub mod config;
pub mod error;
pub mod estimation;
pub mod pipeline;
pub mod replay;
pub mod streamer;
pub mod types;
pub mod vision_pitch;

pub use error::EstimatorError;
pub use pipeline::{FrameInput, FrameOrchestrator, FrameOutput, PotholeDetection};
pub use types::Config;
