//! Inference service: Single point of contact with the fitted classifier.
//!
//! Every other query in the crate is expressed through `predict` and
//! `predict_proba` here. The service holds no mutable state; the positive
//! class slot is resolved once at construction.

use std::sync::Arc;

use crate::domain::{
    confidence, FeatureVector, PredictionResult, POSITIVE_LABEL, PROBABILITY_TOLERANCE,
};
use crate::ports::{Classifier, ModelError};
use crate::RiskscopeError;

/// Index of label `1` in `classes`, or `0` if the model has no such label.
#[must_use]
pub fn positive_class_index(classes: &[i64]) -> usize {
    classes
        .iter()
        .position(|&c| c == POSITIVE_LABEL)
        .unwrap_or(0)
}

/// Service for running point predictions.
pub struct InferenceService<C: Classifier + ?Sized> {
    classifier: Arc<C>,
    positive_class_index: usize,
}

impl<C: Classifier + ?Sized> InferenceService<C> {
    /// Create a new inference service over a loaded classifier.
    pub fn new(classifier: Arc<C>) -> Self {
        let positive_class_index = positive_class_index(classifier.classes());
        tracing::info!(
            "Inference service ready: model={}, classes={:?}, positive_class_index={}",
            classifier.name(),
            classifier.classes(),
            positive_class_index
        );
        Self {
            classifier,
            positive_class_index,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Arc<C> {
        &self.classifier
    }

    #[must_use]
    pub fn classes(&self) -> &[i64] {
        self.classifier.classes()
    }

    /// Cached slot of the positive class in every distribution.
    #[must_use]
    pub fn positive_class_index(&self) -> usize {
        self.positive_class_index
    }

    /// Most likely class label for a raw feature vector.
    ///
    /// # Errors
    /// Returns `InvalidInput` unless `features` is exactly 14 finite numbers
    /// of the width the model expects.
    pub fn predict(&self, features: &[f64]) -> Result<i64, RiskscopeError> {
        let vector = FeatureVector::from_slice(features)?;
        Ok(self.classifier.predict(vector.as_slice())?)
    }

    /// Probability per class, aligned to `classes()`.
    ///
    /// # Errors
    /// Same input validation as `predict`.
    pub fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, RiskscopeError> {
        let vector = FeatureVector::from_slice(features)?;
        self.proba_for(&vector)
    }

    fn proba_for(&self, vector: &FeatureVector) -> Result<Vec<f64>, RiskscopeError> {
        let proba = self.classifier.predict_proba(vector.as_slice())?;

        if proba.len() != self.classes().len() {
            return Err(ModelError::Malformed(format!(
                "distribution has {} entries for {} classes",
                proba.len(),
                self.classes().len()
            ))
            .into());
        }
        let total: f64 = proba.iter().sum();
        if proba.iter().any(|p| *p < 0.0) || (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ModelError::Malformed(format!(
                "distribution is not normalised (sum={total})"
            ))
            .into());
        }
        Ok(proba)
    }

    /// Highest probability as a percentage, rounded to 2 decimals.
    #[must_use]
    pub fn confidence(distribution: &[f64]) -> f64 {
        confidence(distribution)
    }

    /// Positive-class probability as a percentage.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the distribution has no positive slot.
    pub fn risk_probability(&self, distribution: &[f64]) -> Result<f64, RiskscopeError> {
        distribution
            .get(self.positive_class_index)
            .map(|p| p * 100.0)
            .ok_or_else(|| {
                RiskscopeError::InvalidInput(format!(
                    "distribution has {} entries, positive class index is {}",
                    distribution.len(),
                    self.positive_class_index
                ))
            })
    }

    /// Run a full prediction for one submitted vector.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the model rejects the vector.
    pub fn submit(&self, vector: &FeatureVector) -> Result<PredictionResult, RiskscopeError> {
        let probabilities = self.proba_for(vector)?;
        let predicted_label = self.classifier.predict(vector.as_slice())?;

        let result = PredictionResult {
            predicted_label,
            classes: self.classes().to_vec(),
            probabilities,
            positive_class_index: self.positive_class_index,
            created_at: chrono::Utc::now(),
        };

        tracing::info!(
            "Prediction complete: label={}, confidence={:.2}%, risk={:.2}% ({})",
            result.predicted_label,
            result.confidence(),
            result.risk_probability(),
            result.risk_level()
        );
        Ok(result)
    }
}

impl<C: Classifier + ?Sized> Clone for InferenceService<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: Arc::clone(&self.classifier),
            positive_class_index: self.positive_class_index,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::{ArtifactLoader, DecisionTree};
    use crate::domain::{FeatureField, RiskLevel};
    use crate::ports::argmax;
    use std::path::Path;

    /// Fixed-distribution classifier for label-order tests.
    pub(crate) struct FixedClassifier {
        pub classes: Vec<i64>,
        pub proba: Vec<f64>,
    }

    impl Classifier for FixedClassifier {
        fn classes(&self) -> &[i64] {
            &self.classes
        }
        fn n_features(&self) -> usize {
            14
        }
        fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
            if features.len() != 14 {
                return Err(ModelError::FeatureCount {
                    expected: 14,
                    actual: features.len(),
                });
            }
            Ok(self.proba.clone())
        }
        fn feature_importances(&self) -> Vec<f64> {
            vec![0.0; 14]
        }
        fn params(&self) -> Vec<(String, serde_json::Value)> {
            Vec::new()
        }
    }

    pub(crate) fn fixture_model() -> Arc<DecisionTree> {
        Arc::new(
            ArtifactLoader::default()
                .load(Path::new("models/decision_tree.json"))
                .expect("Fixture model should load"),
        )
    }

    fn fixture_service() -> InferenceService<DecisionTree> {
        InferenceService::new(fixture_model())
    }

    #[test]
    fn test_positive_class_index() {
        assert_eq!(positive_class_index(&[0, 1]), 1);
        assert_eq!(positive_class_index(&[1, 0]), 0);
        assert_eq!(positive_class_index(&[0, 2]), 0);
        assert_eq!(positive_class_index(&[3, 2, 1]), 2);
    }

    #[test]
    fn test_positive_index_cached_from_handle() {
        let service = InferenceService::new(Arc::new(FixedClassifier {
            classes: vec![1, 0],
            proba: vec![0.3, 0.7],
        }));
        assert_eq!(service.positive_class_index(), 0);
        assert_eq!(service.positive_class_index(), 0);

        let dist = service
            .predict_proba(FeatureVector::default().as_slice())
            .expect("predict");
        assert!((service.risk_probability(&dist).expect("risk") - 30.0).abs() < 1e-9);
        assert_eq!(service.predict(FeatureVector::default().as_slice()).expect("predict"), 0);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let service = fixture_service();
        for age in [20.0, 45.0, 46.0, 80.0] {
            for smoker in [0.0, 1.0] {
                let v = FeatureVector::default()
                    .with_value(FeatureField::Age, age)
                    .with_value(FeatureField::Smoker, smoker);
                let p = service.predict_proba(v.as_slice()).expect("predict");
                assert_eq!(p.len(), service.classes().len());
                assert!((p.iter().sum::<f64>() - 1.0).abs() < PROBABILITY_TOLERANCE);
                assert!(p.iter().all(|x| *x >= 0.0));
            }
        }
    }

    #[test]
    fn test_predict_matches_argmax() {
        let service = fixture_service();
        for sbp in [110.0, 150.0] {
            for chol in [180.0, 300.0] {
                let v = FeatureVector::default()
                    .with_value(FeatureField::Age, 60.0)
                    .with_value(FeatureField::SystolicBp, sbp)
                    .with_value(FeatureField::Cholesterol, chol);
                let label = service.predict(v.as_slice()).expect("predict");
                let proba = service.predict_proba(v.as_slice()).expect("proba");
                let best = argmax(&proba).expect("non-empty");
                assert_eq!(label, service.classes()[best]);
            }
        }
    }

    #[test]
    fn test_invalid_input_shapes() {
        let service = fixture_service();

        let err = service.predict(&[1.0; 13]).unwrap_err();
        assert!(matches!(err, RiskscopeError::InvalidInput(_)));

        let mut raw = FeatureVector::default().as_slice().to_vec();
        raw[0] = f64::INFINITY;
        let err = service.predict_proba(&raw).unwrap_err();
        assert!(matches!(err, RiskscopeError::InvalidInput(_)));
    }

    #[test]
    fn test_mismatched_artifact_fails_on_first_query() {
        let mut export = crate::adapters::tree::tests::stump_export();
        export.n_features = 13;
        export.feature_names.clear();
        let tree = DecisionTree::from_export(export).expect("structure is valid");
        let service = InferenceService::new(Arc::new(tree));

        let err = service
            .submit(&FeatureVector::default())
            .unwrap_err();
        assert!(matches!(err, RiskscopeError::InvalidInput(_)));
    }

    #[test]
    fn test_submit_default_profile() {
        let service = fixture_service();
        let result = service.submit(&FeatureVector::default()).expect("submit");

        assert_eq!(result.predicted_label, 0);
        assert_eq!(result.positive_class_index, 1);
        assert!((result.risk_probability() - 1000.0 / 130.0).abs() < 1e-9);
        assert!((result.confidence() - 92.31).abs() < 1e-9);
        assert_eq!(result.risk_level(), RiskLevel::Low);
    }

    #[test]
    fn test_confidence_helper() {
        assert!((InferenceService::<DecisionTree>::confidence(&[0.123456, 0.876544]) - 87.65).abs() < 1e-9);
    }

    #[test]
    fn test_unnormalised_distribution_rejected() {
        let service = InferenceService::new(Arc::new(FixedClassifier {
            classes: vec![0, 1],
            proba: vec![0.5, 0.6],
        }));
        let err = service
            .predict_proba(FeatureVector::default().as_slice())
            .unwrap_err();
        assert!(matches!(err, RiskscopeError::ArtifactLoad(_)));
    }
}
