//! Adapters layer: Concrete implementations of ports.
//!
//! - `tree`: decision tree classifier over an exported artifact
//! - `artifact`: artifact loading, integrity checks and signing
//! - `sanitize`: sensitive-data filtering for logs

pub mod artifact;
pub mod sanitize;
pub mod tree;

pub use artifact::{ArtifactError, ArtifactLoader, VerificationPolicy};
pub use tree::DecisionTree;
