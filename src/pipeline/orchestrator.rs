// src/pipeline/orchestrator.rs
//
// Per-frame driver for the estimation core.
//
// Owns the pitch fuser, the ground projector and the vision pitch source, and
// applies them in a fixed order every frame:
//
//   1. Δt since previous frame → propagate gyro rate
//   2. stationary + accel reliable → absolute update + bias learning
//      (or, in dwell mode, feed the startup initializer first)
//   3. vision pitch with c > 0 → vision update
//   4. θ → projector trig cache (exactly once)
//   5. each track → contact pixel → (D, X), failures dropped
//
// All state is owned here; nothing is shared with the HTTP sink except value
// copies of the produced detections.

use crate::error::EstimatorError;
use crate::estimation::{
    contact_point, rough_area_m2, CamIntrinsics, GroundProjector, InertialSample, MountHeight,
    PitchFuser, ProjectionLimits, StationaryTiltInitializer,
};
use crate::types::{Config, PitchInitMode, SizeModel, TrackedBox};
use crate::vision_pitch::{build_vision_source, VisionFrame, VisionObservation, VisionPitchSource};
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

/// Everything the core needs to know about one frame.
#[derive(Debug, Clone)]
pub struct FrameInput<'a> {
    pub frame: u64,
    /// Frame time in seconds on a monotonic clock; only differences are used
    pub timestamp_s: f64,
    /// Wall-clock stamp forwarded to consumers (ms since epoch)
    pub timestamp_ms: i64,
    pub image_height: u32,
    pub tracks: &'a [TrackedBox],
    /// Inertial reading; `None` means no IMU (rate 0, flags false)
    pub imu: Option<InertialSample>,
    pub vision: Option<VisionObservation>,
}

/// One localized pothole, as forwarded downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PotholeDetection {
    pub track_id: i64,
    pub distance_m: f64,
    pub lateral_m: f64,
    pub size_m2: f64,
    pub frame: u64,
    pub theta_deg: f64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub frame: u64,
    /// `None` until the fuser has been initialized
    pub theta_rad: Option<f64>,
    pub theta_deg: Option<f64>,
    pub detections: Vec<PotholeDetection>,
    /// Tracks that produced no detection this frame
    pub dropped: usize,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct FrameOrchestrator {
    fuser: PitchFuser,
    projector: GroundProjector,
    vision: Box<dyn VisionPitchSource>,
    /// Present only while waiting for the startup dwell
    dwell: Option<StationaryTiltInitializer>,
    size_model: SizeModel,
    contact_bias_px: f64,
    absolute_weight: f64,
    bias_learn_rate: f64,
    last_timestamp_s: Option<f64>,
}

impl FrameOrchestrator {
    pub fn new(config: &Config) -> Result<Self, EstimatorError> {
        let intrinsics = CamIntrinsics::from_config(&config.camera)?;
        let vision = build_vision_source(&config.vision, intrinsics);
        Self::with_vision_source(config, vision)
    }

    /// Same as [`FrameOrchestrator::new`] with a caller-supplied vision source.
    pub fn with_vision_source(
        config: &Config,
        vision: Box<dyn VisionPitchSource>,
    ) -> Result<Self, EstimatorError> {
        config.validate()?;

        let intrinsics = CamIntrinsics::from_config(&config.camera)?;
        let height = MountHeight::new(config.camera.height_m)?;
        let limits = ProjectionLimits::from_config(&config.projection)?;
        let projector = GroundProjector::new(intrinsics, height, limits);

        let mut fuser = PitchFuser::new(config.pitch.alpha)?;
        let dwell = match config.pitch.init_mode {
            PitchInitMode::Configured => {
                fuser.initialize(config.pitch.theta_init_deg.to_radians());
                None
            }
            PitchInitMode::StationaryDwell => {
                info!(
                    "Waiting for {:.1}s stationary dwell before localizing",
                    config.pitch.dwell_secs
                );
                Some(StationaryTiltInitializer::new(config.pitch.dwell_secs))
            }
        };

        info!(
            "Orchestrator ready: fx={:.1} fy={:.1} cx={:.1} cy={:.1} H={:.2}m, vision={}, size={:?}",
            intrinsics.fx(),
            intrinsics.fy(),
            intrinsics.cx(),
            intrinsics.cy(),
            height.meters(),
            vision.name(),
            config.projection.size_model
        );

        Ok(Self {
            fuser,
            projector,
            vision,
            dwell,
            size_model: config.projection.size_model,
            contact_bias_px: config.projection.contact_bias_px,
            absolute_weight: config.pitch.absolute_weight,
            bias_learn_rate: config.pitch.bias_learn_rate,
            last_timestamp_s: None,
        })
    }

    pub fn process_frame(&mut self, input: &FrameInput<'_>) -> FrameOutput {
        let dt = self.frame_interval(input.timestamp_s);
        let imu = input.imu.unwrap_or_default();

        // 1. Gyro first, so updates below act on the propagated θ.
        self.fuser.propagate(imu.gyro_pitch_rate, dt);

        // 2. Absolute tilt, or startup dwell.
        self.apply_inertial(&imu, dt);

        // 3. Vision. Skipped while the dwell is still pending so it cannot
        //    seed the fuser through the fall-through path.
        let estimate = self.vision.estimate(&VisionFrame {
            frame_id: input.frame,
            observation: input.vision.as_ref(),
        });
        if estimate.has_update() && self.dwell.is_none() {
            self.fuser
                .vision_update(estimate.theta_rad, estimate.confidence);
        }

        // 4. One cache refresh per frame.
        let Some(theta) = self.fuser.theta() else {
            if !input.tracks.is_empty() {
                debug!(
                    "Frame {}: pitch not initialized, skipping {} track(s)",
                    input.frame,
                    input.tracks.len()
                );
            }
            return FrameOutput {
                frame: input.frame,
                theta_rad: None,
                theta_deg: None,
                detections: Vec::new(),
                dropped: input.tracks.len(),
            };
        };
        self.projector.update_theta_cache(theta);
        let theta_deg = theta.to_degrees();

        // 5. Localize tracks.
        let mut detections = Vec::with_capacity(input.tracks.len());
        let mut dropped = 0;
        for track in input.tracks {
            let bbox = track.bbox();
            let pixel = contact_point(&bbox, input.image_height, self.contact_bias_px);
            match self.projector.distance_from_pixel(pixel) {
                Ok(ground) => {
                    let size_m2 = rough_area_m2(
                        self.size_model,
                        &bbox,
                        ground.distance_m,
                        input.image_height,
                        self.projector.intrinsics(),
                    );
                    detections.push(PotholeDetection {
                        track_id: track.id,
                        distance_m: ground.distance_m,
                        lateral_m: ground.lateral_m,
                        size_m2,
                        frame: input.frame,
                        theta_deg,
                        timestamp_ms: input.timestamp_ms,
                    });
                }
                Err(e) => {
                    debug!(
                        "Frame {}: track {} at ({:.1}, {:.1}) not localized: {}",
                        input.frame, track.id, pixel.u, pixel.v, e
                    );
                    dropped += 1;
                }
            }
        }

        FrameOutput {
            frame: input.frame,
            theta_rad: Some(theta),
            theta_deg: Some(theta_deg),
            detections,
            dropped,
        }
    }

    fn frame_interval(&mut self, timestamp_s: f64) -> f64 {
        let dt = match self.last_timestamp_s {
            Some(prev) if timestamp_s.is_finite() => timestamp_s - prev,
            _ => 0.0,
        };
        if timestamp_s.is_finite() {
            self.last_timestamp_s = Some(timestamp_s);
        }
        if dt < 0.0 {
            warn!("Frame timestamp went backwards by {:.3}s, ignoring interval", -dt);
            return 0.0;
        }
        dt
    }

    fn apply_inertial(&mut self, imu: &InertialSample, dt: f64) {
        if let Some(dwell) = self.dwell.as_mut() {
            if let Some(theta0) = dwell.update(imu, dt) {
                self.fuser.initialize(theta0);
                self.dwell = None;
                info!(
                    "✅ Pitch initialized from stationary dwell: {:.2}°",
                    theta0.to_degrees()
                );
            }
            if imu.is_quiet() {
                self.fuser
                    .stationary_bias_learn(imu.gyro_pitch_rate, self.bias_learn_rate);
            }
            return;
        }

        if imu.is_quiet() {
            if let Some(theta_abs) = imu.theta_abs {
                self.fuser.absolute_update(theta_abs, self.absolute_weight);
            }
            self.fuser
                .stationary_bias_learn(imu.gyro_pitch_rate, self.bias_learn_rate);
        }
    }

    pub fn theta(&self) -> Option<f64> {
        self.fuser.theta()
    }

    pub fn fuser(&self) -> &PitchFuser {
        &self.fuser
    }

    pub fn projector(&self) -> &GroundProjector {
        &self.projector
    }

    pub fn vision_source_name(&self) -> &'static str {
        self.vision.name()
    }

    pub fn is_waiting_for_dwell(&self) -> bool {
        self.dwell.is_some()
    }
}
