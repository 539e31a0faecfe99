// src/estimation/inertial.rs

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One reading from the (optional) inertial source.
///
/// With no IMU attached the rate is 0 and both flags stay false, so the
/// fuser coasts on its seed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InertialSample {
    /// Pitch rate about the camera X axis (rad/s)
    pub gyro_pitch_rate: f64,
    /// Accelerometer gravity tilt (rad), if the source computes one
    pub theta_abs: Option<f64>,
    pub stationary: bool,
    pub accel_reliable: bool,
}

impl InertialSample {
    /// Stationary with a trustworthy gravity vector.
    pub fn is_quiet(&self) -> bool {
        self.stationary && self.accel_reliable
    }
}

/// Averages accelerometer tilt over a stationary dwell to seed the fuser.
pub struct StationaryTiltInitializer {
    dwell_secs: f64,
    theta_sum: f64,
    sample_count: u32,
    stationary_time: f64,
}

impl StationaryTiltInitializer {
    pub fn new(dwell_secs: f64) -> Self {
        Self {
            dwell_secs,
            theta_sum: 0.0,
            sample_count: 0,
            stationary_time: 0.0,
        }
    }

    /// Feed one sample covering `dt_s` seconds. Returns the averaged tilt once
    /// the dwell is complete; any moving or noisy sample restarts the dwell.
    pub fn update(&mut self, sample: &InertialSample, dt_s: f64) -> Option<f64> {
        let theta = match sample.theta_abs {
            Some(t) if sample.is_quiet() && t.is_finite() => t,
            _ => {
                if self.sample_count > 0 {
                    debug!(
                        "Stationary dwell interrupted after {:.2}s",
                        self.stationary_time
                    );
                }
                self.reset();
                return None;
            }
        };

        if dt_s.is_finite() && dt_s > 0.0 {
            self.stationary_time += dt_s;
        }
        self.theta_sum += theta;
        self.sample_count += 1;

        if self.stationary_time >= self.dwell_secs {
            let mean = self.theta_sum / self.sample_count as f64;
            debug!(
                "Stationary dwell complete: {} samples over {:.2}s, tilt {:.3}°",
                self.sample_count,
                self.stationary_time,
                mean.to_degrees()
            );
            self.reset();
            return Some(mean);
        }
        None
    }

    pub fn reset(&mut self) {
        self.theta_sum = 0.0;
        self.sample_count = 0;
        self.stationary_time = 0.0;
    }

    pub fn stationary_time(&self) -> f64 {
        self.stationary_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quiet(theta: f64) -> InertialSample {
        InertialSample {
            gyro_pitch_rate: 0.0,
            theta_abs: Some(theta),
            stationary: true,
            accel_reliable: true,
        }
    }

    #[test]
    fn test_default_sample_is_not_quiet() {
        assert!(!InertialSample::default().is_quiet());
    }

    #[test]
    fn test_dwell_averages_tilt() {
        let mut init = StationaryTiltInitializer::new(1.0);
        let mut result = None;
        for i in 0..40 {
            let theta = if i % 2 == 0 { 0.25 } else { 0.27 };
            result = init.update(&quiet(theta), 0.033);
            if result.is_some() {
                break;
            }
        }
        assert_relative_eq!(result.unwrap(), 0.26, epsilon = 1e-3);
    }

    #[test]
    fn test_motion_restarts_dwell() {
        let mut init = StationaryTiltInitializer::new(1.0);
        for _ in 0..20 {
            assert!(init.update(&quiet(0.2), 0.033).is_none());
        }
        let moving = InertialSample {
            stationary: false,
            ..quiet(0.2)
        };
        assert!(init.update(&moving, 0.033).is_none());
        assert_eq!(init.stationary_time(), 0.0);
    }
}
