//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and the exported model artifacts.

mod model;

pub use model::{check_dimension, Classifier, ModelError, Scaler};
