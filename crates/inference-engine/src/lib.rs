//! Failure Prediction Inference Engine
//!
//! Holds the fitted standard scaler and random-forest classifier, both loaded
//! once from JSON artifacts, and scores feature vectors against them.

mod engine;
mod forest;
mod loader;
mod scaler;

pub use engine::{InferenceEngine, Verdict};
pub use forest::{DecisionTree, Node, RandomForest};
pub use loader::{load_json_artifact, DEFAULT_MODEL_PATH, DEFAULT_SCALER_PATH};
pub use scaler::StandardScaler;

use feature_engine::FeatureVector;
use std::path::PathBuf;
use thiserror::Error;

/// Errors during artifact loading or inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to read artifact {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse artifact {path}: {source}")]
    ArtifactParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

/// Maps a feature vector to a verdict.
///
/// Implementations must be safe to call concurrently through `&self`.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> Result<Verdict, InferenceError>;
}
