// src/error.rs

use thiserror::Error;

/// Errors surfaced by the distance estimation core.
///
/// Uninitialized-fuser calls are not errors: propagation is a silent no-op and
/// absolute/vision updates fall through to initialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    /// The pixel lies at or above the horizon, or the pitch is degenerate.
    #[error("invalid ground geometry (denom={denom:.6}, distance={distance})")]
    GeometryInvalid { denom: f64, distance: f64 },

    /// Rejected at construction; the core never runs with bad parameters.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

impl EstimatorError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationInvalid(msg.into())
    }
}
