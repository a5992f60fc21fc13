//! JSON artifact loader

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

use crate::InferenceError;

/// Default location of the fitted scaler
pub const DEFAULT_SCALER_PATH: &str = "model/scaler.json";
/// Default location of the fitted classifier
pub const DEFAULT_MODEL_PATH: &str = "model/model.json";

/// Read and deserialize one artifact file
pub fn load_json_artifact<T, P>(path: P) -> Result<T, InferenceError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    info!(path = %path.display(), "Loading model artifact");

    let content = std::fs::read_to_string(path).map_err(|source| InferenceError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| InferenceError::ArtifactParse {
        path: path.to_path_buf(),
        source,
    })
}
