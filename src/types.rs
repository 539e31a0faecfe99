// src/types.rs

use crate::estimation::pitch_fuser::{
    DEFAULT_ABSOLUTE_WEIGHT, DEFAULT_ALPHA, DEFAULT_BIAS_LEARN_RATE,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub pitch: PitchConfig,
    pub projection: ProjectionConfig,
    pub vision: VisionConfig,
    pub stream: StreamConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

/// Pinhole intrinsics and mounting height.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Optical center height above the road plane (meters)
    pub height_m: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
            height_m: 1.50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchInitMode {
    /// Seed the fuser from `theta_init_deg` at startup.
    Configured,
    /// Wait for a stationary dwell and seed from the averaged accelerometer tilt.
    StationaryDwell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Initial pitch in degrees (positive = tilted down)
    pub theta_init_deg: f64,
    /// Complementary filter smoothing constant, in (0, 1)
    pub alpha: f64,
    /// Gyro bias learning rate while stationary
    pub bias_learn_rate: f64,
    /// Weight of the accelerometer tilt when stationary
    pub absolute_weight: f64,
    pub init_mode: PitchInitMode,
    /// Stationary dwell required before seeding from the accelerometer (seconds)
    pub dwell_secs: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            theta_init_deg: 15.0,
            alpha: DEFAULT_ALPHA,
            bias_learn_rate: DEFAULT_BIAS_LEARN_RATE,
            absolute_weight: DEFAULT_ABSOLUTE_WEIGHT,
            init_mode: PitchInitMode::Configured,
            dwell_secs: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeModel {
    /// `(w * D / (img_h/2)) * (h * D / (img_h/2))`, kept for dashboard compatibility.
    Legacy,
    /// `w * h * D^2 / (fx * fy)`
    Principled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub max_lateral_m: f64,
    /// Downward nudge applied to the box bottom edge (pixels)
    pub contact_bias_px: f64,
    pub size_model: SizeModel,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 0.5,
            max_distance_m: 200.0,
            max_lateral_m: 50.0,
            contact_bias_px: 2.0,
            size_model: SizeModel::Legacy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionSourceKind {
    None,
    Horizon,
    Foe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub source: VisionSourceKind,
    /// Observations below this confidence produce no update
    pub min_confidence: f64,
    /// Sliding window (frames) for the FOE median
    pub foe_window: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            source: VisionSourceKind::None,
            min_confidence: 0.2,
            foe_window: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One POST per frame carrying every detection
    Batch,
    /// One POST per detection
    PerDetection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub mode: StreamMode,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:5001/webhook".to_string(),
            timeout_ms: 1000,
            mode: StreamMode::Batch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_jsonl: bool,
    /// Measure frame intervals with the monotonic clock instead of record timestamps
    pub use_wall_clock: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
            output_dir: "output".to_string(),
            save_jsonl: true,
            use_wall_clock: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "pothole_localizer=info,reqwest=warn".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY VALUE TYPES
// ============================================================================

/// Image pixel (u = column, v = row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub u: f64,
    pub v: f64,
}

impl PixelPoint {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

/// Axis-aligned integer box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Round tracker corners to the pixel grid. Out-of-range corners
    /// saturate instead of wrapping.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let ix1 = x1.round() as i32;
        let iy1 = y1.round() as i32;
        let ix2 = x2.round() as i32;
        let iy2 = y2.round() as i32;
        Self {
            x: ix1,
            y: iy1,
            w: ix2.saturating_sub(ix1),
            h: iy2.saturating_sub(iy1),
        }
    }
}

/// Tracker output: persistent ID plus corner box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedBox {
    pub id: i64,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl TrackedBox {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_corners(self.x1, self.y1, self.x2, self.y2)
    }
}

/// Metric position of a road point relative to the camera's ground origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundPoint {
    /// Longitudinal distance along the ground (meters)
    pub distance_m: f64,
    /// Lateral offset, positive right (meters)
    pub lateral_m: f64,
}
