//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the risk assessment use case.

mod prediction;

pub use prediction::{ArtifactPredictionService, PredictionService};
