//! Standard Scaler

use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// On-disk scaler layout, checked before use
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerArtifact {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Per-feature affine transform `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalerArtifact", into = "ScalerArtifact")]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build a scaler, rejecting mismatched lengths and unusable scales
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, InferenceError> {
        let dimension = feature_names.len();
        if dimension == 0 {
            return Err(InferenceError::InvalidArtifact(
                "scaler has no features".to_string(),
            ));
        }
        if mean.len() != dimension || scale.len() != dimension {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler has {} names, {} means and {} scales",
                dimension,
                mean.len(),
                scale.len()
            )));
        }
        if let Some(i) = mean.iter().position(|m| !m.is_finite()) {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler mean for {} is not finite",
                feature_names[i]
            )));
        }
        if let Some(i) = scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler scale for {} must be finite and non-zero",
                feature_names[i]
            )));
        }

        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    /// Feature names recorded when the scaler was fitted
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn dimension(&self) -> usize {
        self.feature_names.len()
    }

    /// Scale one row
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if row.len() != self.dimension() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.dimension(),
                actual: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }
}

impl TryFrom<ScalerArtifact> for StandardScaler {
    type Error = InferenceError;

    fn try_from(artifact: ScalerArtifact) -> Result<Self, Self::Error> {
        Self::new(artifact.feature_names, artifact.mean, artifact.scale)
    }
}

impl From<StandardScaler> for ScalerArtifact {
    fn from(scaler: StandardScaler) -> Self {
        Self {
            feature_names: scaler.feature_names,
            mean: scaler.mean,
            scale: scaler.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_transform() {
        let scaler = StandardScaler::new(names(2), vec![10.0, 0.5], vec![2.0, 0.25]).unwrap();
        let scaled = scaler.transform(&[14.0, 0.0]).unwrap();
        assert_eq!(scaled, vec![2.0, -2.0]);
    }

    #[test]
    fn test_transform_shape_mismatch() {
        let scaler = StandardScaler::new(names(2), vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(InferenceError::InvalidInputShape { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_rejects_bad_artifacts() {
        assert!(StandardScaler::new(vec![], vec![], vec![]).is_err());
        assert!(StandardScaler::new(names(2), vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(StandardScaler::new(names(1), vec![f64::NAN], vec![1.0]).is_err());
        assert!(StandardScaler::new(names(1), vec![0.0], vec![0.0]).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: StandardScaler =
            serde_json::from_str(r#"{"feature_names":["a"],"mean":[1.0],"scale":[2.0]}"#).unwrap();
        assert_eq!(ok.dimension(), 1);

        let zero_scale =
            serde_json::from_str::<StandardScaler>(r#"{"feature_names":["a"],"mean":[1.0],"scale":[0.0]}"#);
        assert!(zero_scale.is_err());
    }

    proptest! {
        #[test]
        fn prop_transform_inverts(
            x in -1e4f64..1e4,
            mean in -1e3f64..1e3,
            scale in 0.01f64..1e3,
        ) {
            let scaler = StandardScaler::new(names(1), vec![mean], vec![scale]).unwrap();
            let scaled = scaler.transform(&[x]).unwrap();
            let restored = scaled[0] * scale + mean;

            prop_assert!((restored - x).abs() <= 1e-9 * x.abs().max(1.0));
        }
    }
}
