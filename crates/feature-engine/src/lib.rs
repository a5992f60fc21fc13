//! Feature Engineering Engine
//!
//! Turns raw equipment telemetry into the ordered feature vector the
//! failure classifier was fitted on.

mod features;

pub use features::{derive, FeatureVector, TelemetryInput, FEATURE_DIMENSION, FEATURE_NAMES};

use thiserror::Error;

/// Errors during feature derivation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// NaN or infinite input, or a derived feature that overflowed
    #[error("Feature {field} is not a finite number")]
    NonFinite { field: &'static str },
}
