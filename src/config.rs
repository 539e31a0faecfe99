// src/config.rs

use crate::error::EstimatorError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use tracing::info;

impl Config {
    /// Read and parse only. Environment overrides and validation are applied
    /// separately so the caller can install logging from `logging.level` first.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }

    /// `POTHOLE_STREAM_URL` replaces the stream endpoint.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("POTHOLE_STREAM_URL") {
            if !url.trim().is_empty() {
                info!("Stream endpoint overridden from environment: {}", url);
                self.stream.endpoint = url;
            }
        }
    }

    pub fn validate(&self) -> Result<(), EstimatorError> {
        let cam = &self.camera;
        if !(cam.fx > 0.0) || !(cam.fy > 0.0) {
            return Err(EstimatorError::config(format!(
                "focal lengths must be positive (fx={}, fy={})",
                cam.fx, cam.fy
            )));
        }
        if !cam.cx.is_finite() || !cam.cy.is_finite() {
            return Err(EstimatorError::config("principal point must be finite"));
        }
        if !(cam.height_m > 0.0) || !cam.height_m.is_finite() {
            return Err(EstimatorError::config(format!(
                "camera height must be positive, got {}",
                cam.height_m
            )));
        }

        let pitch = &self.pitch;
        if !(pitch.alpha > 0.0 && pitch.alpha < 1.0) {
            return Err(EstimatorError::config(format!(
                "alpha must lie in (0, 1), got {}",
                pitch.alpha
            )));
        }
        if !(0.0..=1.0).contains(&pitch.bias_learn_rate) {
            return Err(EstimatorError::config(format!(
                "bias_learn_rate must lie in [0, 1], got {}",
                pitch.bias_learn_rate
            )));
        }
        if !pitch.theta_init_deg.is_finite() {
            return Err(EstimatorError::config("theta_init_deg must be finite"));
        }
        if !(pitch.dwell_secs > 0.0) {
            return Err(EstimatorError::config(format!(
                "dwell_secs must be positive, got {}",
                pitch.dwell_secs
            )));
        }

        let proj = &self.projection;
        if !(proj.min_distance_m > 0.0) || !(proj.max_distance_m >= proj.min_distance_m) {
            return Err(EstimatorError::config(format!(
                "distance range invalid ({} .. {})",
                proj.min_distance_m, proj.max_distance_m
            )));
        }
        if !(proj.max_lateral_m > 0.0) {
            return Err(EstimatorError::config(format!(
                "max_lateral_m must be positive, got {}",
                proj.max_lateral_m
            )));
        }
        if !proj.contact_bias_px.is_finite() {
            return Err(EstimatorError::config("contact_bias_px must be finite"));
        }

        if self.vision.foe_window == 0 {
            return Err(EstimatorError::config("foe_window must be at least 1"));
        }

        Ok(())
    }
}
