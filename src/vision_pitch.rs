// src/vision_pitch.rs
//
// Vision-derived pitch sources.
//
// A front-end (horizon line fit, focus of expansion from optical flow, road
// homography) reports image-row observations per frame. Sources here turn
// those rows into (θ_vis, c) for the pitch fuser. c = 0 means "no update".
//
// The source is chosen once at construction from config; there is no
// runtime plugin mechanism.

use crate::estimation::intrinsics::CamIntrinsics;
use crate::types::{VisionConfig, VisionSourceKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

// ============================================================================
// TYPES
// ============================================================================

/// Raw per-frame observation from the vision front-end.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionObservation {
    /// Detected horizon row (pixels)
    pub horizon_row: Option<f64>,
    /// Row of the focus of expansion (pixels)
    pub foe_row: Option<f64>,
    /// Front-end confidence in [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct VisionFrame<'a> {
    pub frame_id: u64,
    pub observation: Option<&'a VisionObservation>,
}

/// Output handed to `PitchFuser::vision_update`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionPitch {
    pub theta_rad: f64,
    pub confidence: f64,
}

impl VisionPitch {
    pub fn none() -> Self {
        Self {
            theta_rad: 0.0,
            confidence: 0.0,
        }
    }

    pub fn has_update(&self) -> bool {
        self.confidence > 0.0 && self.theta_rad.is_finite()
    }
}

pub trait VisionPitchSource: Send {
    fn name(&self) -> &'static str;

    fn estimate(&mut self, frame: &VisionFrame<'_>) -> VisionPitch;
}

// ============================================================================
// SOURCES
// ============================================================================

/// Never updates. Default when no vision front-end is wired in.
pub struct NoVisionPitch;

impl VisionPitchSource for NoVisionPitch {
    fn name(&self) -> &'static str {
        "none"
    }

    fn estimate(&mut self, _frame: &VisionFrame<'_>) -> VisionPitch {
        VisionPitch::none()
    }
}

/// Pitch from the detected horizon row: θ = atan((cy - v_h) / fy).
pub struct HorizonPitch {
    intrinsics: CamIntrinsics,
    min_confidence: f64,
}

impl HorizonPitch {
    pub fn new(intrinsics: CamIntrinsics, min_confidence: f64) -> Self {
        Self {
            intrinsics,
            min_confidence,
        }
    }
}

impl VisionPitchSource for HorizonPitch {
    fn name(&self) -> &'static str {
        "horizon"
    }

    fn estimate(&mut self, frame: &VisionFrame<'_>) -> VisionPitch {
        let Some(obs) = frame.observation else {
            return VisionPitch::none();
        };
        let Some(row) = obs.horizon_row.filter(|r| r.is_finite()) else {
            return VisionPitch::none();
        };
        if !(obs.confidence >= self.min_confidence) {
            return VisionPitch::none();
        }
        VisionPitch {
            theta_rad: self.intrinsics.pitch_from_horizon_row(row),
            confidence: obs.confidence.clamp(0.0, 1.0),
        }
    }
}

/// Pitch from the focus-of-expansion row.
///
/// Single-frame FOE rows jump around with flow noise, so the row used is the
/// median of a sliding window. Confidence is scaled by how full the window is.
pub struct FoePitch {
    intrinsics: CamIntrinsics,
    min_confidence: f64,
    history: VecDeque<f64>,
    window_size: usize,
}

impl FoePitch {
    pub fn new(intrinsics: CamIntrinsics, min_confidence: f64, window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            intrinsics,
            min_confidence,
            history: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    fn median_row(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let mut rows: Vec<f64> = self.history.iter().copied().collect();
        rows.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(rows[rows.len() / 2])
    }
}

impl VisionPitchSource for FoePitch {
    fn name(&self) -> &'static str {
        "foe"
    }

    fn estimate(&mut self, frame: &VisionFrame<'_>) -> VisionPitch {
        let Some(obs) = frame.observation else {
            return VisionPitch::none();
        };
        let Some(row) = obs.foe_row.filter(|r| r.is_finite()) else {
            return VisionPitch::none();
        };
        if !(obs.confidence >= self.min_confidence) {
            return VisionPitch::none();
        }

        self.history.push_back(row);
        if self.history.len() > self.window_size {
            self.history.pop_front();
        }

        let Some(median) = self.median_row() else {
            return VisionPitch::none();
        };
        let fill = self.history.len() as f64 / self.window_size as f64;
        let theta = self.intrinsics.pitch_from_horizon_row(median);

        debug!(
            "FOE pitch frame {}: median row {:.1} ({} samples) → {:.2}°",
            frame.frame_id,
            median,
            self.history.len(),
            theta.to_degrees()
        );

        VisionPitch {
            theta_rad: theta,
            confidence: (obs.confidence * fill).clamp(0.0, 1.0),
        }
    }
}

pub fn build_vision_source(
    config: &VisionConfig,
    intrinsics: CamIntrinsics,
) -> Box<dyn VisionPitchSource> {
    let source: Box<dyn VisionPitchSource> = match config.source {
        VisionSourceKind::None => Box::new(NoVisionPitch),
        VisionSourceKind::Horizon => Box::new(HorizonPitch::new(intrinsics, config.min_confidence)),
        VisionSourceKind::Foe => Box::new(FoePitch::new(
            intrinsics,
            config.min_confidence,
            config.foe_window,
        )),
    };
    info!("Vision pitch source: {}", source.name());
    source
}
