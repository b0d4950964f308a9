//! Sensitivity sweep types and candidate-value generation.
//!
//! A sweep varies one field of a base vector while holding the others fixed.
//! Boolean fields are swept over exactly `[0, 1]`; continuous fields over an
//! evenly spaced range scaled from the base value.

use serde::{Deserialize, Serialize};

use super::features::{FeatureField, FeatureVector};

/// Candidate-value policy for continuous fields.
///
/// Only the `NARROW` and `WIDE` presets exist, so every policy sweeps at
/// least two distinct points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPolicy {
    /// Lower bound as a multiple of the base value
    lo_factor: f64,
    /// Upper bound as a multiple of the base value
    hi_factor: f64,
    /// Number of evenly spaced points, endpoints included
    points: usize,
    /// Range used when the base value is exactly zero
    zero_fallback: (f64, f64),
}

impl SweepPolicy {
    /// 0.8x to 1.2x of the base value over 30 points.
    pub const NARROW: SweepPolicy = SweepPolicy {
        lo_factor: 0.8,
        hi_factor: 1.2,
        points: 30,
        zero_fallback: (-1.0, 1.0),
    };

    /// 0.5x to 1.5x of the base value over 40 points.
    pub const WIDE: SweepPolicy = SweepPolicy {
        lo_factor: 0.5,
        hi_factor: 1.5,
        points: 40,
        zero_fallback: (-1.0, 1.0),
    };

    /// Look up a named preset (`"narrow"` or `"wide"`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "narrow" => Some(Self::NARROW),
            "wide" => Some(Self::WIDE),
            _ => None,
        }
    }

    #[must_use]
    pub fn lo_factor(&self) -> f64 {
        self.lo_factor
    }

    #[must_use]
    pub fn hi_factor(&self) -> f64 {
        self.hi_factor
    }

    /// Candidate count for continuous fields.
    #[must_use]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Candidate values for `field` around `base`.
    ///
    /// Continuous candidates are always increasing: for a negative base the
    /// scaled bounds are swapped. Bounds saturate at `±f64::MAX`.
    #[must_use]
    pub fn candidates(&self, field: FeatureField, base: f64) -> Vec<f64> {
        if field.is_boolean() {
            return vec![0.0, 1.0];
        }

        // 0 * factor collapses to a single point.
        let (lo, hi) = if base == 0.0 {
            self.zero_fallback
        } else {
            let a = (base * self.lo_factor).clamp(-f64::MAX, f64::MAX);
            let b = (base * self.hi_factor).clamp(-f64::MAX, f64::MAX);
            (a.min(b), a.max(b))
        };

        linspace(lo, hi, self.points)
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self::NARROW
    }
}

/// `n` evenly spaced values from `start` to `end`, both inclusive.
#[must_use]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = end;
            out
        }
    }
}

/// A fully resolved sweep request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSpec {
    pub base_vector: FeatureVector,
    pub field: FeatureField,
    pub candidate_values: Vec<f64>,
}

impl SweepSpec {
    #[must_use]
    pub fn new(base_vector: FeatureVector, field: FeatureField, policy: &SweepPolicy) -> Self {
        let candidate_values = policy.candidates(field, base_vector.get(field));
        Self {
            base_vector,
            field,
            candidate_values,
        }
    }

    /// The base vector with the target field set to each candidate in turn.
    pub fn variants(&self) -> impl Iterator<Item = (f64, FeatureVector)> + '_ {
        self.candidate_values
            .iter()
            .map(|&v| (v, self.base_vector.with_value(self.field, v)))
    }
}

/// One point on a sensitivity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    /// Positive-class probability as a percentage
    pub risk_probability: f64,
}

/// Sensitivity curve for one field, ordered like the candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub field: FeatureField,
    pub points: Vec<SweepPoint>,
}

impl SweepResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    #[must_use]
    pub fn risk_probabilities(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.risk_probability).collect()
    }

    /// Spread between the highest and lowest risk on the curve.
    #[must_use]
    pub fn risk_span(&self) -> f64 {
        let (min, max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.risk_probability), hi.max(p.risk_probability))
            });
        if self.points.is_empty() {
            0.0
        } else {
            max - min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints_and_spacing() {
        let v = linspace(20.0, 30.0, 30);
        assert_eq!(v.len(), 30);
        assert!((v[0] - 20.0).abs() < 1e-12);
        assert!((v[29] - 30.0).abs() < 1e-12);

        let step = 10.0 / 29.0;
        for w in v.windows(2) {
            assert!(w[1] > w[0]);
            assert!((w[1] - w[0] - step).abs() < 1e-9);
        }
    }

    #[test]
    fn test_linspace_degenerate_counts() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
    }

    #[test]
    fn test_boolean_candidates() {
        let policy = SweepPolicy::default();
        for field in [
            FeatureField::Gender,
            FeatureField::Smoker,
            FeatureField::Alcohol,
            FeatureField::FamilyHistory,
        ] {
            assert_eq!(policy.candidates(field, 1.0), vec![0.0, 1.0]);
            assert_eq!(policy.candidates(field, 0.0), vec![0.0, 1.0]);
        }
    }

    #[test]
    fn test_bmi_candidates_narrow() {
        let values = SweepPolicy::NARROW.candidates(FeatureField::Bmi, 25.0);
        assert_eq!(values.len(), 30);
        assert!((values[0] - 20.0).abs() < 1e-9);
        assert!((values[29] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_wide_candidates() {
        let values = SweepPolicy::WIDE.candidates(FeatureField::Cholesterol, 200.0);
        assert_eq!(values.len(), 40);
        assert!((values[0] - 100.0).abs() < 1e-9);
        assert!((values[39] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_uses_fallback_range() {
        let values = SweepPolicy::NARROW.candidates(FeatureField::DailySteps, 0.0);
        assert_eq!(values.len(), 30);
        assert!((values[0] + 1.0).abs() < 1e-12);
        assert!((values[29] - 1.0).abs() < 1e-12);
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_negative_base_still_increasing() {
        let values = SweepPolicy::NARROW.candidates(FeatureField::Calories, -100.0);
        assert!((values[0] + 120.0).abs() < 1e-9);
        assert!((values[29] + 80.0).abs() < 1e-9);
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_spec_variants_copy_base() {
        let base = FeatureVector::default();
        let spec = SweepSpec::new(base, FeatureField::Smoker, &SweepPolicy::default());

        let variants: Vec<_> = spec.variants().collect();
        assert_eq!(variants.len(), 2);
        assert!((variants[1].1.get(FeatureField::Smoker) - 1.0).abs() < f64::EPSILON);
        assert_eq!(spec.base_vector, base);
    }

    #[test]
    fn test_huge_base_stays_finite() {
        for policy in [SweepPolicy::NARROW, SweepPolicy::WIDE] {
            for base in [f64::MAX, -f64::MAX, f64::MAX / 1.1] {
                let values = policy.candidates(FeatureField::Calories, base);
                assert_eq!(values.len(), policy.points());
                assert!(values.iter().all(|v| v.is_finite()));
                assert!(values.windows(2).all(|w| w[1] > w[0]));
            }
        }
    }

    #[test]
    fn test_presets_sweep_several_points() {
        for policy in [SweepPolicy::NARROW, SweepPolicy::WIDE, SweepPolicy::default()] {
            assert!(policy.points() >= 2);
            assert!(policy.lo_factor() < policy.hi_factor());
        }
    }

    #[test]
    fn test_policy_from_name() {
        assert_eq!(SweepPolicy::from_name("WIDE"), Some(SweepPolicy::WIDE));
        assert_eq!(SweepPolicy::from_name("narrow"), Some(SweepPolicy::NARROW));
        assert_eq!(SweepPolicy::from_name("medium"), None);
    }

    #[test]
    fn test_risk_span() {
        let result = SweepResult {
            field: FeatureField::Bmi,
            points: vec![
                SweepPoint { value: 1.0, risk_probability: 10.0 },
                SweepPoint { value: 2.0, risk_probability: 35.0 },
                SweepPoint { value: 3.0, risk_probability: 20.0 },
            ],
        };
        assert!((result.risk_span() - 25.0).abs() < 1e-12);
        assert_eq!(result.values(), vec![1.0, 2.0, 3.0]);
    }
}
