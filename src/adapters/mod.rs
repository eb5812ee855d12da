//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the integration with the exported model files:
//! - `artifacts`: loading and signature verification of the model directory
//! - `sklearn`: scaler and classifier implementations
//! - `sanitize`: clinical-value filtering for logs

pub mod artifacts;
pub mod sanitize;
pub mod sklearn;

pub use artifacts::ArtifactError;
