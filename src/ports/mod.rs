//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, the application layer only sees the
//! `Classifier` trait, never a concrete model format.

mod classifier;

pub use classifier::{argmax, default_feature_names, Classifier, ModelError};
