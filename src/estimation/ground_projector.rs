// src/estimation/ground_projector.rs
//
// Flat-ground back-projection of a road pixel into metric (D, X).
//
// For a pinhole tilted down by θ at height H above a horizontal plane:
//
//   y_n = (v - cy) / fy,  x_n = (u - cx) / fx
//   D   = H·cosθ / (sinθ + y_n·cosθ)
//   X   = D · x_n
//
// sinθ, cosθ and H·cosθ live in a per-frame cache so each query costs two
// divisions, two multiplies and two adds. The cache is refreshed only by
// `update_theta_cache`, never from inside a query.

use crate::error::EstimatorError;
use crate::estimation::intrinsics::{CamIntrinsics, MountHeight};
use crate::types::{GroundPoint, PixelPoint, ProjectionConfig};

/// Denominators at or below this are treated as at/above the horizon.
pub const MIN_DENOM: f64 = 1e-4;

/// Cache refresh threshold on |θ - θ_cached| (radians).
pub const THETA_CACHE_EPS: f64 = 1e-6;

/// Trusted road strip. Results are clamped into it, never rejected by it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionLimits {
    pub min_distance_m: f64,
    pub max_distance_m: f64,
    pub max_lateral_m: f64,
}

impl Default for ProjectionLimits {
    fn default() -> Self {
        Self {
            min_distance_m: 0.5,
            max_distance_m: 200.0,
            max_lateral_m: 50.0,
        }
    }
}

impl ProjectionLimits {
    pub fn new(
        min_distance_m: f64,
        max_distance_m: f64,
        max_lateral_m: f64,
    ) -> Result<Self, EstimatorError> {
        if !(min_distance_m > 0.0) || !(max_distance_m >= min_distance_m) {
            return Err(EstimatorError::config(format!(
                "distance range invalid ({} .. {})",
                min_distance_m, max_distance_m
            )));
        }
        if !(max_lateral_m > 0.0) {
            return Err(EstimatorError::config(format!(
                "max lateral must be positive, got {}",
                max_lateral_m
            )));
        }
        Ok(Self {
            min_distance_m,
            max_distance_m,
            max_lateral_m,
        })
    }

    pub fn from_config(config: &ProjectionConfig) -> Result<Self, EstimatorError> {
        Self::new(
            config.min_distance_m,
            config.max_distance_m,
            config.max_lateral_m,
        )
    }
}

/// Trig values for the last accepted θ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrigCache {
    pub theta: f64,
    pub sin: f64,
    pub cos: f64,
    pub h_cos: f64,
}

impl TrigCache {
    fn at(theta: f64, height_m: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self {
            theta,
            sin,
            cos,
            h_cos: height_m * cos,
        }
    }
}

pub struct GroundProjector {
    intrinsics: CamIntrinsics,
    height: MountHeight,
    limits: ProjectionLimits,
    cache: TrigCache,
}

impl GroundProjector {
    pub fn new(intrinsics: CamIntrinsics, height: MountHeight, limits: ProjectionLimits) -> Self {
        Self {
            intrinsics,
            height,
            limits,
            cache: TrigCache::at(0.0, height.meters()),
        }
    }

    /// Refresh the trig cache. No-op when θ moved by at most 1e-6 rad.
    /// Returns whether the cache was recomputed.
    pub fn update_theta_cache(&mut self, theta_rad: f64) -> bool {
        if !theta_rad.is_finite() {
            return false;
        }
        if (theta_rad - self.cache.theta).abs() <= THETA_CACHE_EPS {
            return false;
        }
        self.cache = TrigCache::at(theta_rad, self.height.meters());
        true
    }

    /// Back-project a ground pixel using the cached θ and default limits.
    pub fn distance_from_pixel(&self, p: PixelPoint) -> Result<GroundPoint, EstimatorError> {
        self.distance_from_pixel_with(p, &self.limits)
    }

    pub fn distance_from_pixel_with(
        &self,
        p: PixelPoint,
        limits: &ProjectionLimits,
    ) -> Result<GroundPoint, EstimatorError> {
        let (xn, yn) = self.intrinsics.normalize(p);

        let denom = self.cache.sin + yn * self.cache.cos;
        if !(denom > MIN_DENOM) {
            return Err(EstimatorError::GeometryInvalid {
                denom,
                distance: f64::NAN,
            });
        }

        let d = self.cache.h_cos / denom;
        if !d.is_finite() || d < 0.0 {
            return Err(EstimatorError::GeometryInvalid { denom, distance: d });
        }

        let x = d * xn;

        Ok(GroundPoint {
            distance_m: d.clamp(limits.min_distance_m, limits.max_distance_m),
            lateral_m: x.clamp(-limits.max_lateral_m, limits.max_lateral_m),
        })
    }

    pub fn cache(&self) -> &TrigCache {
        &self.cache
    }

    pub fn intrinsics(&self) -> &CamIntrinsics {
        &self.intrinsics
    }

    pub fn height(&self) -> MountHeight {
        self.height
    }

    pub fn limits(&self) -> &ProjectionLimits {
        &self.limits
    }
}
