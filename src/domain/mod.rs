//! Domain layer: Core business types and logic.
//!
//! This module contains pure Rust types with no I/O.
//! All types are serializable and implement strict validation.

mod diagnosis;
pub mod features;
pub mod patient;

pub use diagnosis::{Diagnosis, Prediction, ProbabilitySource, RiskLevel};
pub use features::{align, encode, DenseFeatureVector, EncodedFeatureMap, ExpectedSchema};
pub use patient::{
    Categorical, ChestPainType, ExerciseAngina, RawClinicalInput, RestingEcg, Sex, StSlope,
    ValidationError,
};
