//! Prediction result types.
//!
//! Represents the output of a single classifier query over one feature vector.

use serde::{Deserialize, Serialize};

/// Class label of the risk-present outcome.
pub const POSITIVE_LABEL: i64 = 1;

/// Allowed deviation of a probability distribution's sum from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Risk band for the risk-probability gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Below 40%
    Low,
    /// 40% up to 70%
    Moderate,
    /// 70% and above
    High,
}

impl RiskLevel {
    /// Band a risk percentage in [0, 100].
    #[must_use]
    pub fn from_percent(risk_percent: f64) -> Self {
        if risk_percent < 40.0 {
            Self::Low
        } else if risk_percent < 70.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - No significant indicators",
            Self::Moderate => "Moderate risk - Follow-up recommended",
            Self::High => "High risk - Consultation advised",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Display name for a class label.
#[must_use]
pub fn class_display_name(label: i64) -> String {
    match label {
        0 => "No Risk".to_string(),
        POSITIVE_LABEL => "Risk".to_string(),
        other => format!("Class {other}"),
    }
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Highest class probability as a percentage, rounded to 2 decimals.
///
/// An empty distribution has zero confidence.
#[must_use]
pub fn confidence(distribution: &[f64]) -> f64 {
    let max = distribution.iter().copied().fold(0.0_f64, f64::max);
    round2(max * 100.0)
}

/// Result of one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Most likely class label
    pub predicted_label: i64,

    /// Known class labels, in model order
    pub classes: Vec<i64>,

    /// Probability per class, aligned to `classes`
    pub probabilities: Vec<f64>,

    /// Slot of the positive class in `probabilities`
    pub positive_class_index: usize,

    /// Timestamp of the request
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PredictionResult {
    /// `(label, probability)` pairs in model order.
    pub fn distribution(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.classes
            .iter()
            .copied()
            .zip(self.probabilities.iter().copied())
    }

    #[must_use]
    pub fn probability_of(&self, label: i64) -> Option<f64> {
        self.distribution()
            .find(|(l, _)| *l == label)
            .map(|(_, p)| p)
    }

    /// Highest class probability as a percentage (2 decimals).
    #[must_use]
    pub fn confidence(&self) -> f64 {
        confidence(&self.probabilities)
    }

    /// Positive-class probability as a percentage.
    #[must_use]
    pub fn risk_probability(&self) -> f64 {
        self.probabilities
            .get(self.positive_class_index)
            .copied()
            .unwrap_or(0.0)
            * 100.0
    }

    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_percent(self.risk_probability())
    }

    #[must_use]
    pub fn is_at_risk(&self) -> bool {
        self.predicted_label == POSITIVE_LABEL
    }

    /// Short verdict line for display.
    #[must_use]
    pub fn headline(&self) -> &'static str {
        if self.is_at_risk() {
            "Health Risk Detected"
        } else {
            "No Significant Health Risk"
        }
    }

    /// One bar per class for the probability distribution chart.
    #[must_use]
    pub fn probability_bars(&self) -> Vec<ProbabilityBar> {
        self.distribution()
            .map(|(label, p)| ProbabilityBar {
                label,
                name: class_display_name(label),
                percent: round2(p * 100.0),
            })
            .collect()
    }
}

/// A single bar of the probability distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityBar {
    pub label: i64,
    pub name: String,
    pub percent: f64,
}
