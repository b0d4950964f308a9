//! Sensitivity analyzer: how predicted risk moves as one input varies.
//!
//! Each sweep copies the base vector once per candidate value, overwrites a
//! single field and re-queries the inference service. Any failed query
//! fails the whole sweep; partial curves are never returned.

use std::sync::Arc;

use super::inference::InferenceService;
use crate::domain::{FeatureField, FeatureVector, Session, SweepPoint, SweepPolicy, SweepResult, SweepSpec};
use crate::ports::Classifier;
use crate::RiskscopeError;

/// Service for single-feature sensitivity sweeps.
pub struct SensitivityAnalyzer<C: Classifier + ?Sized> {
    inference: Arc<InferenceService<C>>,
    policy: SweepPolicy,
}

impl<C: Classifier + ?Sized> SensitivityAnalyzer<C> {
    /// Create an analyzer with the given candidate policy.
    pub fn new(inference: Arc<InferenceService<C>>, policy: SweepPolicy) -> Self {
        Self { inference, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    /// Resolve the candidate values for a sweep without running it.
    ///
    /// # Errors
    /// Returns `InvalidField` if `field_index` is not in 0..14.
    pub fn plan(&self, base: &FeatureVector, field_index: usize) -> Result<SweepSpec, RiskscopeError> {
        let field = FeatureField::from_index(field_index).ok_or_else(|| {
            RiskscopeError::InvalidField(format!(
                "field index {field_index} is outside 0..{}",
                FeatureField::ALL.len()
            ))
        })?;
        Ok(SweepSpec::new(*base, field, &self.policy))
    }

    /// Sweep one field of `base` and record the risk at each candidate.
    ///
    /// Boolean fields are swept over `[0, 1]`; continuous fields follow the
    /// analyzer's `SweepPolicy`. `base` is never modified.
    ///
    /// # Errors
    /// Returns `InvalidField` for an out-of-range index, or the first
    /// classifier error encountered.
    pub fn sweep(&self, base: &FeatureVector, field_index: usize) -> Result<SweepResult, RiskscopeError> {
        let spec = self.plan(base, field_index)?;
        self.run(&spec)
    }

    /// Run a resolved sweep.
    ///
    /// # Errors
    /// Returns the first classifier error encountered.
    pub fn run(&self, spec: &SweepSpec) -> Result<SweepResult, RiskscopeError> {
        tracing::debug!(
            "Sweeping {} over {} candidates",
            spec.field,
            spec.candidate_values.len()
        );

        let points = spec
            .variants()
            .map(|(value, variant)| {
                let proba = self.inference.predict_proba(variant.as_slice())?;
                let risk_probability = self.inference.risk_probability(&proba)?;
                Ok(SweepPoint {
                    value,
                    risk_probability,
                })
            })
            .collect::<Result<Vec<_>, RiskscopeError>>()?;

        Ok(SweepResult {
            field: spec.field,
            points,
        })
    }

    /// Sweep a field, by name, around a session's last submitted input.
    ///
    /// # Errors
    /// Returns `InvalidField` for an unknown field name, or `InvalidInput`
    /// if the session has nothing submitted yet.
    pub fn analyze(&self, field_name: &str, session: &Session) -> Result<SweepResult, RiskscopeError> {
        let field = FeatureField::from_name(field_name).ok_or_else(|| {
            RiskscopeError::InvalidField(format!("unknown field `{field_name}`"))
        })?;
        let base = session.last_input.as_ref().ok_or_else(|| {
            RiskscopeError::InvalidInput("run a prediction before analysing a field".into())
        })?;
        self.sweep(base, field.index())
    }
}
