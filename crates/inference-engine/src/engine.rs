//! Inference Engine Implementation

use feature_engine::{FeatureVector, FEATURE_DIMENSION, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::forest::RandomForest;
use crate::loader::load_json_artifact;
use crate::scaler::StandardScaler;
use crate::{InferenceError, Scorer};

/// Class label the classifier uses for a failure
const FAILURE_LABEL: i64 = 1;
const NO_FAILURE_LABEL: i64 = 0;

/// Binary model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Failure")]
    Failure,
    #[serde(rename = "No Failure")]
    NoFailure,
}

impl Verdict {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Failure => "Failure",
            Verdict::NoFailure => "No Failure",
        }
    }

    /// Map a classifier label (1 → Failure, 0 → No Failure)
    pub fn from_label(label: i64) -> Result<Self, InferenceError> {
        match label {
            FAILURE_LABEL => Ok(Verdict::Failure),
            NO_FAILURE_LABEL => Ok(Verdict::NoFailure),
            other => Err(InferenceError::InferenceFailed(format!(
                "unexpected class label {}",
                other
            ))),
        }
    }
}

/// Fitted scaler and classifier, immutable after construction
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    scaler: StandardScaler,
    forest: RandomForest,
}

impl InferenceEngine {
    /// Load both artifacts from disk
    pub fn load(
        scaler_path: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
    ) -> Result<Self, InferenceError> {
        let scaler: StandardScaler = load_json_artifact(scaler_path)?;
        let forest: RandomForest = load_json_artifact(model_path)?;
        Self::from_parts(scaler, forest)
    }

    /// Build from in-memory artifacts, checking they fit the feature layout
    pub fn from_parts(scaler: StandardScaler, forest: RandomForest) -> Result<Self, InferenceError> {
        let names: Vec<&str> = scaler.feature_names().iter().map(String::as_str).collect();
        if names != FEATURE_NAMES {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler feature order {:?} does not match {:?}",
                names, FEATURE_NAMES
            )));
        }
        if forest.n_features() != FEATURE_DIMENSION {
            return Err(InferenceError::InvalidArtifact(format!(
                "classifier expects {} features, pipeline produces {}",
                forest.n_features(),
                FEATURE_DIMENSION
            )));
        }
        if forest.classes() != [NO_FAILURE_LABEL, FAILURE_LABEL] {
            return Err(InferenceError::InvalidArtifact(format!(
                "classifier classes {:?} are not [0, 1]",
                forest.classes()
            )));
        }

        info!(
            features = FEATURE_DIMENSION,
            trees = forest.n_trees(),
            "Inference engine ready"
        );
        Ok(Self { scaler, forest })
    }

    /// Probability of the failure class
    pub fn failure_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let scaled = self.scaler.transform(features.as_array())?;
        let proba = self.forest.predict_proba(&scaled)?;
        Ok(proba[1])
    }

    /// Scale the features and classify them
    pub fn score(&self, features: &FeatureVector) -> Result<Verdict, InferenceError> {
        let start = Instant::now();

        let scaled = self.scaler.transform(features.as_array())?;
        let verdict = Verdict::from_label(self.forest.predict(&scaled)?)?;

        debug!(
            verdict = verdict.as_str(),
            latency_us = start.elapsed().as_micros() as u64,
            "Inference completed"
        );
        Ok(verdict)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}

impl Scorer for InferenceEngine {
    fn score(&self, features: &FeatureVector) -> Result<Verdict, InferenceError> {
        InferenceEngine::score(self, features)
    }
}
