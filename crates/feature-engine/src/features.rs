//! Feature Vector Assembly

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::FeatureError;

/// Number of features in the vector
pub const FEATURE_DIMENSION: usize = 6;

/// Column names in the order the scaler and classifier expect them
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSION] = [
    "temperature",
    "vibration",
    "pressure",
    "operational_hours",
    "temp_pressure_interaction",
    "vibration_squared",
];

/// Raw telemetry submitted with a prediction request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryInput {
    pub temperature: f64,
    pub vibration: f64,
    pub pressure: f64,
    pub operational_hours: u64,
}

/// Ordered feature vector for the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_DIMENSION],
}

impl FeatureVector {
    pub fn temperature(&self) -> f64 {
        self.values[0]
    }

    pub fn vibration(&self) -> f64 {
        self.values[1]
    }

    pub fn pressure(&self) -> f64 {
        self.values[2]
    }

    pub fn operational_hours(&self) -> f64 {
        self.values[3]
    }

    /// temperature × pressure
    pub fn temp_pressure_interaction(&self) -> f64 {
        self.values[4]
    }

    /// vibration²
    pub fn vibration_squared(&self) -> f64 {
        self.values[5]
    }

    /// Values in [`FEATURE_NAMES`] order
    pub fn as_array(&self) -> &[f64; FEATURE_DIMENSION] {
        &self.values
    }

    /// (name, value) pairs in canonical order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        (0..FEATURE_DIMENSION).map(move |i| (FEATURE_NAMES[i], self.values[i]))
    }
}

impl TryFrom<&TelemetryInput> for FeatureVector {
    type Error = FeatureError;

    fn try_from(input: &TelemetryInput) -> Result<Self, Self::Error> {
        derive(input)
    }
}

/// Derive the feature vector from one telemetry reading.
///
/// Values are not range checked; only non-finite numbers are rejected.
pub fn derive(input: &TelemetryInput) -> Result<FeatureVector, FeatureError> {
    let values = [
        input.temperature,
        input.vibration,
        input.pressure,
        input.operational_hours as f64,
        input.temperature * input.pressure,
        input.vibration * input.vibration,
    ];

    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(FeatureError::NonFinite {
            field: FEATURE_NAMES[position],
        });
    }

    trace!("Derived {} features", FEATURE_DIMENSION);
    Ok(FeatureVector { values })
}
