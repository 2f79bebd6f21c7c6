/// Pretrained binary classifier loaded from a local artifact file.
///
/// The model is an externally trained artifact — this service never trains
/// or updates it. The artifact is a JSON export of a gradient-boosted
/// ensemble of oblivious (symmetric) decision trees: every tree applies
/// the same `feature > border` split at each depth, so a tree of depth d
/// is d splits plus 2^d leaf values, and the leaf index is the bitmask of
/// split outcomes. The raw ensemble score goes through a sigmoid link to
/// produce the probability.
///
/// Missing feature values always take the false (≤ border) branch, the
/// convention the model was trained with.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::features::FEATURE_COUNT;
use crate::model::PipelineError;

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// A binary classifier over the fixed, ordered 72-column feature vector.
pub trait Classifier {
    /// Returns the probability of the positive class, in [0, 1].
    ///
    /// `features` must follow the canonical `features::feature_names()`
    /// order; a length mismatch is a ModelArtifact error.
    fn predict_proba(&self, features: &[Option<f64>]) -> Result<f64, PipelineError>;
}

// ---------------------------------------------------------------------------
// Artifact format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Split {
    /// Index into the canonical feature vector.
    feature: usize,
    /// Split threshold; the true branch is `value > border`.
    border: f64,
}

#[derive(Debug, Deserialize)]
struct Tree {
    /// One split per depth level, shared across the whole level.
    splits: Vec<Split>,
    /// 2^depth leaf values, indexed by the split-outcome bitmask
    /// (level 0 split is the least significant bit).
    leaf_values: Vec<f64>,
}

/// A loaded oblivious-tree ensemble.
#[derive(Debug, Deserialize)]
pub struct ObliviousTreeModel {
    feature_names: Vec<String>,
    #[serde(default)]
    bias: f64,
    trees: Vec<Tree>,
}

impl ObliviousTreeModel {
    /// Loads and validates the artifact from `path`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::ModelArtifact(format!("cannot read {}: {}", path.display(), e))
        })?;
        let model: ObliviousTreeModel = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::ModelArtifact(format!("invalid artifact {}: {}", path.display(), e))
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.feature_names.len() != FEATURE_COUNT {
            return Err(PipelineError::ModelArtifact(format!(
                "artifact expects {} features, pipeline produces {}",
                self.feature_names.len(),
                FEATURE_COUNT
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.leaf_values.len() != 1 << tree.splits.len() {
                return Err(PipelineError::ModelArtifact(format!(
                    "tree {} has {} splits but {} leaf values",
                    i,
                    tree.splits.len(),
                    tree.leaf_values.len()
                )));
            }
            if let Some(split) = tree.splits.iter().find(|s| s.feature >= FEATURE_COUNT) {
                return Err(PipelineError::ModelArtifact(format!(
                    "tree {} references feature index {} out of range",
                    i, split.feature
                )));
            }
        }
        Ok(())
    }

    fn raw_score(&self, features: &[Option<f64>]) -> f64 {
        let mut score = self.bias;
        for tree in &self.trees {
            let mut leaf = 0usize;
            for (level, split) in tree.splits.iter().enumerate() {
                // None never exceeds the border.
                let goes_right = features[split.feature]
                    .map(|v| v > split.border)
                    .unwrap_or(false);
                if goes_right {
                    leaf |= 1 << level;
                }
            }
            score += tree.leaf_values[leaf];
        }
        score
    }
}

impl Classifier for ObliviousTreeModel {
    fn predict_proba(&self, features: &[Option<f64>]) -> Result<f64, PipelineError> {
        if features.len() != self.feature_names.len() {
            return Err(PipelineError::ModelArtifact(format!(
                "feature vector has {} values, model expects {}",
                features.len(),
                self.feature_names.len()
            )));
        }
        Ok(sigmoid(self.raw_score(features)))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
