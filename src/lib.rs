//! # Riskscope
//!
//! Lifestyle-disease risk inference over a pre-fitted decision tree.
//!
//! This crate provides:
//! - Point predictions with confidence and risk scores over a fixed
//!   14-field clinical/lifestyle feature vector
//! - Single-feature sensitivity sweeps ("what-if" curves)
//! - Model insights: feature-importance ranking, hyperparameters, tree rendering
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core value types (feature vectors, predictions, sweeps, sessions)
//! - `ports`: The `Classifier` trait the application layer is written against
//! - `adapters`: Concrete implementations (decision tree, artifact loading, log sanitizing)
//! - `application`: Inference, sensitivity and insight services
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{InferenceService, ModelInsights, SensitivityAnalyzer};
pub use domain::{FeatureField, FeatureVector, PredictionResult, RiskLevel, Session, SweepResult};

/// Result type for Riskscope operations
pub type Result<T> = std::result::Result<T, RiskscopeError>;

/// Main error type for Riskscope
#[derive(Debug, thiserror::Error)]
pub enum RiskscopeError {
    /// Wrong vector shape, non-numeric entries, or no submitted input to analyze.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sweep target outside the 14 known fields.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Model artifact missing, corrupt, or failing integrity checks.
    #[error("Failed to load model artifact: {0}")]
    ArtifactLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ports::ModelError> for RiskscopeError {
    fn from(err: ports::ModelError) -> Self {
        match err {
            ports::ModelError::FeatureCount { .. } | ports::ModelError::NonFinite { .. } => {
                Self::InvalidInput(err.to_string())
            }
            ports::ModelError::Malformed(_) => Self::ArtifactLoad(err.to_string()),
        }
    }
}

impl From<adapters::ArtifactError> for RiskscopeError {
    fn from(err: adapters::ArtifactError) -> Self {
        Self::ArtifactLoad(err.to_string())
    }
}
