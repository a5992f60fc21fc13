//! Random Forest Classifier
//!
//! Trees are stored as flat node arrays. A split sends a row left when
//! `row[feature] <= threshold`; a leaf holds per-class weights. The forest
//! averages each tree's normalised leaf distribution.

use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// A single tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

/// Flat decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Check bounds and acyclicity. Children must come after their parent.
    fn validate(&self, index: usize, n_features: usize, n_classes: usize) -> Result<(), InferenceError> {
        let invalid = |msg: String| InferenceError::InvalidArtifact(format!("tree {}: {}", index, msg));

        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }

        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(invalid(format!("node {} splits on feature {}", i, feature)));
                    }
                    if threshold.is_nan() {
                        return Err(invalid(format!("node {} has a NaN threshold", i)));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= len {
                            return Err(invalid(format!("node {} points to node {}", i, child)));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(invalid(format!(
                            "leaf {} has {} weights for {} classes",
                            i,
                            value.len(),
                            n_classes
                        )));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(invalid(format!("leaf {} has a negative or non-finite weight", i)));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return Err(invalid(format!("leaf {} has zero total weight", i)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk to the leaf reached by `row`
    fn leaf(&self, row: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestArtifact {
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
}

/// Ensemble of decision trees voting by mean class probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForestArtifact", into = "ForestArtifact")]
pub struct RandomForest {
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Build a forest, validating every tree
    pub fn new(
        n_features: usize,
        classes: Vec<i64>,
        trees: Vec<DecisionTree>,
    ) -> Result<Self, InferenceError> {
        if n_features == 0 {
            return Err(InferenceError::InvalidArtifact(
                "forest expects zero features".to_string(),
            ));
        }
        if classes.len() < 2 {
            return Err(InferenceError::InvalidArtifact(format!(
                "forest has {} classes",
                classes.len()
            )));
        }
        if trees.is_empty() {
            return Err(InferenceError::InvalidArtifact("forest has no trees".to_string()));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i, n_features, classes.len())?;
        }

        Ok(Self {
            n_features,
            classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class labels in probability order
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean class distribution over all trees
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if row.len() != self.n_features {
            return Err(InferenceError::InvalidInputShape {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(row);
            let total: f64 = leaf.iter().sum();
            for (p, w) in proba.iter_mut().zip(leaf) {
                *p += w / total;
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        Ok(proba)
    }

    /// Label with the highest mean probability; ties go to the earlier class
    pub fn predict(&self, row: &[f64]) -> Result<i64, InferenceError> {
        let proba = self.predict_proba(row)?;
        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });
        Ok(self.classes[best])
    }
}

impl TryFrom<ForestArtifact> for RandomForest {
    type Error = InferenceError;

    fn try_from(artifact: ForestArtifact) -> Result<Self, Self::Error> {
        Self::new(artifact.n_features, artifact.classes, artifact.trees)
    }
}

impl From<RandomForest> for ForestArtifact {
    fn from(forest: RandomForest) -> Self {
        Self {
            n_features: forest.n_features,
            classes: forest.classes,
            trees: forest.trees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(value: &[f64]) -> Node {
        Node::Leaf {
            value: value.to_vec(),
        }
    }

    fn stump(feature: usize, threshold: f64) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                leaf(&[1.0, 0.0]),
                leaf(&[0.0, 1.0]),
            ],
        }
    }

    #[test]
    fn test_split_goes_left_on_equal() {
        let forest = RandomForest::new(1, vec![0, 1], vec![stump(0, 0.5)]).unwrap();
        assert_eq!(forest.predict(&[0.5]).unwrap(), 0);
        assert_eq!(forest.predict(&[0.51]).unwrap(), 1);
    }

    #[test]
    fn test_probabilities_average_normalised_leaves() {
        let weighted = DecisionTree {
            nodes: vec![leaf(&[30.0, 10.0])],
        };
        let forest = RandomForest::new(1, vec![0, 1], vec![stump(0, 0.0), weighted]).unwrap();

        let proba = forest.predict_proba(&[1.0]).unwrap();
        assert!((proba[0] - 0.375).abs() < 1e-12);
        assert!((proba[1] - 0.625).abs() < 1e-12);
        assert_eq!(forest.predict(&[1.0]).unwrap(), 1);
    }

    #[test]
    fn test_tie_goes_to_first_class() {
        let forest = RandomForest::new(1, vec![0, 1], vec![stump(0, 0.0), stump(0, 2.0)]).unwrap();
        assert_eq!(forest.predict(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn test_rejects_malformed_trees() {
        let out_of_range_feature = stump(3, 0.0);
        assert!(RandomForest::new(2, vec![0, 1], vec![out_of_range_feature]).is_err());

        let cycle = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                leaf(&[1.0, 0.0]),
            ],
        };
        assert!(RandomForest::new(1, vec![0, 1], vec![cycle]).is_err());

        let dangling = DecisionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 1,
                right: 2,
            }],
        };
        assert!(RandomForest::new(1, vec![0, 1], vec![dangling]).is_err());

        let short_leaf = DecisionTree {
            nodes: vec![leaf(&[1.0])],
        };
        assert!(RandomForest::new(1, vec![0, 1], vec![short_leaf]).is_err());

        let zero_leaf = DecisionTree {
            nodes: vec![leaf(&[0.0, 0.0])],
        };
        assert!(RandomForest::new(1, vec![0, 1], vec![zero_leaf]).is_err());

        assert!(RandomForest::new(1, vec![0, 1], vec![]).is_err());
        assert!(RandomForest::new(1, vec![0], vec![stump(0, 0.0)]).is_err());
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let forest = RandomForest::new(2, vec![0, 1], vec![stump(1, 0.0)]).unwrap();
        assert!(matches!(
            forest.predict(&[1.0]),
            Err(InferenceError::InvalidInputShape { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_deserialize_tagged_nodes() {
        let json = r#"{
            "n_features": 1,
            "classes": [0, 1],
            "trees": [{ "nodes": [
                { "kind": "split", "feature": 0, "threshold": 0.0, "left": 1, "right": 2 },
                { "kind": "leaf", "value": [1.0, 0.0] },
                { "kind": "leaf", "value": [0.0, 1.0] }
            ]}]
        }"#;
        let forest: RandomForest = serde_json::from_str(json).unwrap();
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.classes(), &[0, 1]);

        let broken = json.replace("\"left\": 1", "\"left\": 0");
        assert!(serde_json::from_str::<RandomForest>(&broken).is_err());
    }

    proptest! {
        #[test]
        fn prop_probabilities_sum_to_one(
            row in -1e6f64..1e6,
            threshold in -10.0f64..10.0,
            weight in 0.001f64..1e3,
        ) {
            let weighted = DecisionTree {
                nodes: vec![leaf(&[weight, 1.0])],
            };
            let forest = RandomForest::new(
                1,
                vec![0, 1],
                vec![stump(0, threshold), stump(0, -threshold), weighted],
            )
            .unwrap();

            let proba = forest.predict_proba(&[row]).unwrap();
            prop_assert_eq!(proba.len(), 2);
            prop_assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
            prop_assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }
}
