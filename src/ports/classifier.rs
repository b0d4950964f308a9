//! Classifier port: Trait for a fitted, read-only classification model.
//!
//! This trait abstracts the concrete model (a decision tree loaded from an
//! exported artifact) from the application logic.

use crate::domain::{FEATURE_COUNT, FEATURE_NAMES};

/// Errors a classifier can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Feature {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("Malformed model: {0}")]
    Malformed(String),
}

/// Trait for a fitted binary (or multi-class) classifier.
///
/// Implementations are immutable after construction and are shared
/// read-only across requests, hence `Send + Sync`.
pub trait Classifier: Send + Sync {
    /// Known class labels, in the order probability distributions use.
    fn classes(&self) -> &[i64];

    /// Number of input features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Probability per class, aligned to `classes()`.
    ///
    /// # Errors
    /// Returns `ModelError::FeatureCount` / `ModelError::NonFinite` on bad input.
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Most likely class label.
    ///
    /// Ties resolve to the earliest class, so this always agrees with the
    /// maximum entry of `predict_proba`.
    ///
    /// # Errors
    /// Same as `predict_proba`.
    fn predict(&self, features: &[f64]) -> Result<i64, ModelError> {
        let proba = self.predict_proba(features)?;
        argmax(&proba)
            .and_then(|i| self.classes().get(i).copied())
            .ok_or_else(|| ModelError::Malformed("empty probability distribution".into()))
    }

    /// Relative importance per input feature, in column order.
    fn feature_importances(&self) -> Vec<f64>;

    /// Fitted configuration parameters as `(name, value)` pairs.
    fn params(&self) -> Vec<(String, serde_json::Value)>;

    /// Column names in model order.
    fn feature_names(&self) -> Vec<String> {
        default_feature_names(self.n_features())
    }

    /// Text rendering of the model structure, if the model has one.
    fn render_text(
        &self,
        _feature_names: &[String],
        _class_names: &[String],
        _max_depth: Option<usize>,
    ) -> Option<String> {
        None
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Index of the first maximum entry.
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// The 14 known field names when the width matches, else `feature_<i>`.
#[must_use]
pub fn default_feature_names(n_features: usize) -> Vec<String> {
    if n_features == FEATURE_COUNT {
        FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
    } else {
        (0..n_features).map(|i| format!("feature_{i}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.2, 0.7, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_default_feature_names() {
        assert_eq!(default_feature_names(14)[13], "family_history");
        assert_eq!(default_feature_names(3), vec!["feature_0", "feature_1", "feature_2"]);
    }
}
