// src/estimation/pitch_fuser.rs
//
// Complementary filter for camera pitch θ against the road plane.
//
// Evidence arrives at three rates:
//   - gyro pitch rate (100-1000 Hz): precise short-term, drifts
//   - accelerometer tilt: absolute, only trustworthy when stationary
//   - vision pitch (horizon / FOE): absolute, caller-supplied confidence
//
// The fuser never fails. Non-finite inputs are discarded, weights are
// clamped to [0, 1], and θ itself is left unbounded; the projector's
// denominator guard catches unrealistic values downstream.

use crate::error::EstimatorError;
use tracing::{debug, warn};

pub const DEFAULT_ALPHA: f64 = 0.985;
pub const DEFAULT_BIAS_LEARN_RATE: f64 = 0.002;
pub const DEFAULT_ABSOLUTE_WEIGHT: f64 = 0.3;

#[inline]
fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Scalar pitch estimator with gyro-bias learning.
///
/// Starts Uninitialized. Only [`PitchFuser::initialize`] or the fall-through
/// paths of [`PitchFuser::absolute_update`] / [`PitchFuser::vision_update`]
/// move it to Initialized, and there is no way back.
#[derive(Debug, Clone)]
pub struct PitchFuser {
    alpha: f64,
    theta: f64,
    bias: f64,
    initialized: bool,
}

impl PitchFuser {
    pub fn new(alpha: f64) -> Result<Self, EstimatorError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(EstimatorError::config(format!(
                "alpha must lie in (0, 1), got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            theta: 0.0,
            bias: 0.0,
            initialized: false,
        })
    }

    /// Seed θ, typically from a stationary accelerometer average or the
    /// configured default.
    pub fn initialize(&mut self, theta0_rad: f64) {
        if !theta0_rad.is_finite() {
            warn!("Ignoring non-finite pitch seed: {}", theta0_rad);
            return;
        }
        self.theta = theta0_rad;
        self.initialized = true;
        debug!("Pitch fuser initialized at {:.3}°", theta0_rad.to_degrees());
    }

    /// Integrate the bias-compensated gyro rate over `dt_s` seconds.
    pub fn propagate(&mut self, gyro_pitch_rate: f64, dt_s: f64) {
        if !self.initialized {
            return;
        }
        if !gyro_pitch_rate.is_finite() || !dt_s.is_finite() || dt_s < 0.0 {
            debug!(
                "Discarding propagation (rate={}, dt={})",
                gyro_pitch_rate, dt_s
            );
            return;
        }
        self.theta += (gyro_pitch_rate - self.bias) * dt_s;
    }

    /// Blend in the accelerometer tilt. Only meant for the stationary,
    /// low-vibration regime.
    pub fn absolute_update(&mut self, theta_abs_rad: f64, weight: f64) {
        if !theta_abs_rad.is_finite() || weight.is_nan() {
            debug!(
                "Discarding absolute update (theta={}, w={})",
                theta_abs_rad, weight
            );
            return;
        }
        if !self.initialized {
            self.initialize(theta_abs_rad);
            return;
        }
        let w = clamp01(weight);
        self.theta = w * theta_abs_rad + (1.0 - w) * self.theta;
    }

    /// Blend in a vision pitch with mixing coefficient `a = α^(1 - c)`.
    ///
    /// Note the direction: `c = 1` gives `a = 1` and leaves θ untouched,
    /// while `c = 0` applies the strongest pull (`a = α`). Callers that mean
    /// "confidence" get the opposite of what they expect; the behavior is kept
    /// as-is for compatibility with existing deployments.
    pub fn vision_update(&mut self, theta_vis_rad: f64, confidence: f64) {
        if !theta_vis_rad.is_finite() || confidence.is_nan() {
            debug!(
                "Discarding vision update (theta={}, c={})",
                theta_vis_rad, confidence
            );
            return;
        }
        if !self.initialized {
            self.initialize(theta_vis_rad);
            return;
        }
        let c = clamp01(confidence);
        let a = self.alpha.powf(1.0 - c);
        self.theta = a * self.theta + (1.0 - a) * theta_vis_rad;
    }

    /// Exponential bias learning. Call only while stationary with low
    /// accelerometer variance, when the true pitch rate is zero.
    pub fn stationary_bias_learn(&mut self, gyro_pitch_rate: f64, learn_rate: f64) {
        if !gyro_pitch_rate.is_finite() || learn_rate.is_nan() {
            return;
        }
        let eta = clamp01(learn_rate);
        self.bias = (1.0 - eta) * self.bias + eta * gyro_pitch_rate;
    }

    /// Current θ, or `None` before initialization.
    pub fn theta(&self) -> Option<f64> {
        self.initialized.then_some(self.theta)
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Default for PitchFuser {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            theta: 0.0,
            bias: 0.0,
            initialized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const THETA0: f64 = 0.2618;

    fn seeded() -> PitchFuser {
        let mut f = PitchFuser::new(DEFAULT_ALPHA).unwrap();
        f.initialize(THETA0);
        f
    }

    #[test]
    fn test_rejects_alpha_out_of_range() {
        assert!(PitchFuser::new(0.0).is_err());
        assert!(PitchFuser::new(1.0).is_err());
        assert!(PitchFuser::new(f64::NAN).is_err());
        assert!(PitchFuser::new(0.5).is_ok());
    }

    #[test]
    fn test_propagate_is_noop_until_initialized() {
        let mut f = PitchFuser::default();
        f.propagate(0.5, 1.0);
        assert!(!f.is_initialized());
        assert_eq!(f.theta(), None);
    }

    #[test]
    fn test_updates_fall_through_to_initialize() {
        let mut f = PitchFuser::default();
        f.absolute_update(0.1, 0.0);
        assert_eq!(f.theta(), Some(0.1));

        let mut f = PitchFuser::default();
        f.vision_update(0.3, 1.0);
        assert_eq!(f.theta(), Some(0.3));
    }

    #[test]
    fn test_propagation_ten_steps() {
        let mut f = seeded();
        for _ in 0..10 {
            f.propagate(0.1, 0.01);
        }
        assert_abs_diff_eq!(f.theta().unwrap(), 0.2718, epsilon = 10.0 * f64::EPSILON);
    }

    #[test]
    fn test_propagation_is_linear() {
        let (omega, dt, n) = (-0.37, 0.004, 250);
        let mut f = seeded();
        for _ in 0..n {
            f.propagate(omega, dt);
        }
        let expected = THETA0 + n as f64 * omega * dt;
        assert_abs_diff_eq!(f.theta().unwrap(), expected, epsilon = n as f64 * 1e-15);
    }

    #[test]
    fn test_propagation_subtracts_bias() {
        let mut f = seeded();
        for _ in 0..5000 {
            f.stationary_bias_learn(0.01, 0.01);
        }
        f.propagate(0.01, 1.0);
        assert_abs_diff_eq!(f.theta().unwrap(), THETA0, epsilon = 1e-6);
    }

    #[test]
    fn test_absolute_update_blends_and_clamps() {
        let mut f = seeded();
        f.absolute_update(0.3, 0.3);
        assert_relative_eq!(f.theta().unwrap(), 0.3 * 0.3 + 0.7 * THETA0, epsilon = 1e-15);

        let mut f = seeded();
        f.absolute_update(0.5, 7.0);
        assert_eq!(f.theta(), Some(0.5));

        let mut f = seeded();
        f.absolute_update(0.5, -2.0);
        assert_eq!(f.theta(), Some(THETA0));
    }

    #[test]
    fn test_vision_blend_half_confidence() {
        let mut f = seeded();
        f.vision_update(0.30, 0.5);
        let a = 0.985f64.sqrt();
        assert_relative_eq!(a, 0.99247, epsilon = 1e-5);
        assert_relative_eq!(f.theta().unwrap(), 0.26209, epsilon = 1e-5);
    }

    #[test]
    fn test_vision_full_confidence_leaves_theta_unchanged() {
        let mut f = seeded();
        f.vision_update(0.9, 1.0);
        assert_eq!(f.theta(), Some(THETA0));

        // Clamped above 1 behaves the same.
        f.vision_update(0.9, 3.0);
        assert_eq!(f.theta(), Some(THETA0));
    }

    #[test]
    fn test_vision_zero_confidence_applies_alpha() {
        let mut f = seeded();
        f.vision_update(0.30, 0.0);
        let expected = DEFAULT_ALPHA * THETA0 + (1.0 - DEFAULT_ALPHA) * 0.30;
        assert_relative_eq!(f.theta().unwrap(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_bias_converges_geometrically() {
        let (omega, eta) = (0.05, 0.002);
        let mut f = seeded();
        let mut prev_err = omega;
        for _ in 0..100 {
            f.stationary_bias_learn(omega, eta);
            let err = omega - f.bias();
            assert_relative_eq!(err, prev_err * (1.0 - eta), max_relative = 1e-9);
            prev_err = err;
        }
    }

    #[test]
    fn test_non_finite_inputs_are_discarded() {
        let mut f = seeded();
        f.propagate(f64::NAN, 0.01);
        f.propagate(0.1, f64::INFINITY);
        f.absolute_update(f64::NAN, 0.3);
        f.vision_update(0.3, f64::NAN);
        f.stationary_bias_learn(f64::NAN, 0.002);
        assert_eq!(f.theta(), Some(THETA0));
        assert_eq!(f.bias(), 0.0);

        let mut f = PitchFuser::default();
        f.initialize(f64::NAN);
        assert!(!f.is_initialized());
    }
}
