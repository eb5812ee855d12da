//! # cardiorisk
//!
//! Heart-disease risk prediction from routine clinical attributes.
//!
//! This crate provides:
//! - A feature vector builder turning a clinical form into the dense,
//!   schema-ordered vector a trained classifier expects
//! - Loading of exported scaler/classifier artifacts with signature checks
//! - Terminal UI for local-only use
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (clinical input, feature vector, diagnosis)
//! - `ports`: Trait definitions for the scaler and classifier
//! - `adapters`: Concrete implementations (artifact loading, sklearn models, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use domain::{Diagnosis, RawClinicalInput, RiskLevel};

/// Result type for cardiorisk operations
pub type Result<T> = std::result::Result<T, CardioriskError>;

/// Main error type for cardiorisk
#[derive(Debug, thiserror::Error)]
pub enum CardioriskError {
    #[error("Invalid clinical input: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Model artifacts unavailable: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
