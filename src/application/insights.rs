//! Model insights: read-only views of the fitted classifier.
//!
//! Feature importance ranking, fitted hyperparameters and a text rendering
//! of the tree structure.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::class_display_name;
use crate::ports::Classifier;

/// One entry of the importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// One fitted configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperparameter {
    pub name: String,
    pub value: serde_json::Value,
}

/// Service exposing model metadata.
pub struct ModelInsights<C: Classifier + ?Sized> {
    classifier: Arc<C>,
}

impl<C: Classifier + ?Sized> ModelInsights<C> {
    pub fn new(classifier: Arc<C>) -> Self {
        Self { classifier }
    }

    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.classifier.feature_names()
    }

    /// Features sorted by importance, highest first.
    ///
    /// Equal importances keep column order.
    #[must_use]
    pub fn feature_importance_ranking(&self) -> Vec<FeatureImportance> {
        let names = self.feature_names();
        let mut ranking: Vec<FeatureImportance> = self
            .classifier
            .feature_importances()
            .into_iter()
            .enumerate()
            .map(|(i, importance)| FeatureImportance {
                feature: names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("feature_{i}")),
                importance,
            })
            .collect();

        // Stable sort keeps column order for ties.
        ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranking
    }

    /// Fitted parameters, sorted by name.
    #[must_use]
    pub fn hyperparameters(&self) -> Vec<Hyperparameter> {
        let mut params: Vec<Hyperparameter> = self
            .classifier
            .params()
            .into_iter()
            .map(|(name, value)| Hyperparameter { name, value })
            .collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    /// Text rendering of the tree, cut off below `max_depth` when given.
    ///
    /// Returns `None` for models without a renderable structure.
    #[must_use]
    pub fn render_tree(&self, max_depth: Option<usize>) -> Option<String> {
        let class_names: Vec<String> = self
            .classifier
            .classes()
            .iter()
            .map(|&c| class_display_name(c))
            .collect();
        self.classifier
            .render_text(&self.feature_names(), &class_names, max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::inference::tests::{fixture_model, FixedClassifier};

    #[test]
    fn test_importance_ranking_order() {
        let insights = ModelInsights::new(fixture_model());
        let ranking = insights.feature_importance_ranking();

        assert_eq!(ranking.len(), 14);
        let top: Vec<&str> = ranking.iter().take(6).map(|r| r.feature.as_str()).collect();
        assert_eq!(
            top,
            vec!["smoker", "age", "systolic_bp", "bmi", "cholesterol", "family_history"]
        );
        assert!(ranking
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));

        let total: f64 = ranking.iter().map(|r| r.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_ties_keep_column_order() {
        let insights = ModelInsights::new(fixture_model());
        let unused: Vec<String> = insights
            .feature_importance_ranking()
            .into_iter()
            .filter(|r| r.importance == 0.0)
            .map(|r| r.feature)
            .collect();
        assert_eq!(
            unused,
            vec![
                "gender",
                "daily_steps",
                "sleep_hours",
                "water_intake",
                "calories",
                "alcohol",
                "resting_hr",
                "diastolic_bp"
            ]
        );
    }

    #[test]
    fn test_hyperparameters() {
        let insights = ModelInsights::new(fixture_model());
        let params = insights.hyperparameters();

        let max_depth = params
            .iter()
            .find(|p| p.name == "max_depth")
            .expect("max_depth present");
        assert_eq!(max_depth.value, serde_json::json!(3));
        assert!(params.windows(2).all(|w| w[0].name <= w[1].name));
    }

    #[test]
    fn test_render_tree() {
        let insights = ModelInsights::new(fixture_model());
        let full = insights.render_tree(None).expect("tree renders");

        assert!(full.starts_with("|--- smoker <= 0.50\n"));
        assert!(full.contains("|   |   |--- bmi <= 29.95\n"));
        assert!(full.contains("class: No Risk"));
        assert!(full.contains("class: Risk"));
        assert_eq!(full.lines().count(), 19);

        let shallow = insights.render_tree(Some(1)).expect("tree renders");
        assert!(shallow.contains("truncated branch of depth 2"));
        assert!(!shallow.contains("bmi"));
    }

    #[test]
    fn test_non_tree_model_has_no_rendering() {
        let insights = ModelInsights::new(Arc::new(FixedClassifier {
            classes: vec![0, 1],
            proba: vec![0.5, 0.5],
        }));
        assert!(insights.render_tree(None).is_none());
        assert!(insights.hyperparameters().is_empty());
    }
}
