// src/estimation/intrinsics.rs

use crate::error::EstimatorError;
use crate::types::{CameraConfig, PixelPoint};

/// Pinhole intrinsics in pixels. Immutable once validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CamIntrinsics {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
}

impl CamIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, EstimatorError> {
        if !(fx > 0.0 && fx.is_finite()) || !(fy > 0.0 && fy.is_finite()) {
            return Err(EstimatorError::config(format!(
                "focal lengths must be positive and finite (fx={}, fy={})",
                fx, fy
            )));
        }
        if !cx.is_finite() || !cy.is_finite() {
            return Err(EstimatorError::config(format!(
                "principal point must be finite (cx={}, cy={})",
                cx, cy
            )));
        }
        Ok(Self { fx, fy, cx, cy })
    }

    pub fn from_config(camera: &CameraConfig) -> Result<Self, EstimatorError> {
        Self::new(camera.fx, camera.fy, camera.cx, camera.cy)
    }

    pub fn fx(&self) -> f64 {
        self.fx
    }

    pub fn fy(&self) -> f64 {
        self.fy
    }

    pub fn cx(&self) -> f64 {
        self.cx
    }

    pub fn cy(&self) -> f64 {
        self.cy
    }

    /// Normalized ray coordinates `(x_n, y_n)`.
    #[inline]
    pub fn normalize(&self, p: PixelPoint) -> (f64, f64) {
        ((p.u - self.cx) / self.fx, (p.v - self.cy) / self.fy)
    }

    /// Image row where the ground plane vanishes for pitch `theta`.
    pub fn horizon_row(&self, theta_rad: f64) -> f64 {
        self.cy - self.fy * theta_rad.tan()
    }

    /// Pitch that puts the horizon at row `v`. Inverse of [`Self::horizon_row`].
    pub fn pitch_from_horizon_row(&self, v: f64) -> f64 {
        ((self.cy - v) / self.fy).atan()
    }
}

/// Camera optical center height above the road plane, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountHeight(f64);

impl MountHeight {
    pub fn new(meters: f64) -> Result<Self, EstimatorError> {
        if !(meters > 0.0 && meters.is_finite()) {
            return Err(EstimatorError::config(format!(
                "mount height must be positive, got {}",
                meters
            )));
        }
        Ok(Self(meters))
    }

    pub fn meters(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_non_positive_focal() {
        assert!(CamIntrinsics::new(0.0, 600.0, 320.0, 240.0).is_err());
        assert!(CamIntrinsics::new(600.0, -1.0, 320.0, 240.0).is_err());
        assert!(CamIntrinsics::new(f64::NAN, 600.0, 320.0, 240.0).is_err());
        assert!(MountHeight::new(0.0).is_err());
    }

    #[test]
    fn test_horizon_row_round_trip() {
        let k = CamIntrinsics::new(600.0, 600.0, 320.0, 240.0).unwrap();
        let theta = 15f64.to_radians();
        let v_h = k.horizon_row(theta);
        assert_relative_eq!(v_h, 79.23, epsilon = 0.01);
        assert_relative_eq!(k.pitch_from_horizon_row(v_h), theta, epsilon = 1e-12);
    }
}
