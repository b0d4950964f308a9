//! Domain layer: Core value types and pure logic.
//!
//! Nothing in here talks to a model or the filesystem.
//! All types are serializable and validated on construction.

mod features;
pub mod form;
mod prediction;
mod session;
mod sweep;

pub use features::{FeatureField, FeatureVector, RadarPoint, FEATURE_COUNT, FEATURE_NAMES};
pub use form::PatientForm;
pub use prediction::{
    class_display_name, confidence, round2, PredictionResult, ProbabilityBar, RiskLevel,
    POSITIVE_LABEL, PROBABILITY_TOLERANCE,
};
pub use session::Session;
pub use sweep::{linspace, SweepPoint, SweepPolicy, SweepResult, SweepSpec};
