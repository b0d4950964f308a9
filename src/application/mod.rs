//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

pub(crate) mod inference;
mod insights;
mod sensitivity;

pub use inference::{positive_class_index, InferenceService};
pub use insights::{FeatureImportance, Hyperparameter, ModelInsights};
pub use sensitivity::SensitivityAnalyzer;
