//! Model ports: traits for the fitted scaler and the trained classifier.
//!
//! These abstract the exported model artifacts from the application logic.
//! Both operate on plain slices in schema order; the feature vector builder
//! produces the input and never calls these itself.

/// Errors raised by scaler/classifier implementations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),
}

/// Previously fitted feature transformation (e.g. standardization).
pub trait Scaler: Send + Sync {
    /// Number of columns this scaler was fitted on.
    fn dimension(&self) -> usize;

    /// Transform one row.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` if `features.len() != self.dimension()`.
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Trained binary classifier (0 = no disease, 1 = disease).
pub trait Classifier: Send + Sync {
    /// Short identifier of the classifier family, for logs and the UI.
    fn kind(&self) -> &'static str;

    /// Number of input columns.
    fn dimension(&self) -> usize;

    /// Predict the class label for one scaled row.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` on a wrongly sized row.
    fn predict(&self, features: &[f64]) -> Result<u8, ModelError>;

    /// Probability of the positive class, or `None` if the model has no
    /// probability estimation.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` on a wrongly sized row.
    fn predict_proba(&self, features: &[f64]) -> Result<Option<f64>, ModelError>;
}

/// Check a row length against a fitted dimension.
///
/// # Errors
/// Returns `ModelError::DimensionMismatch` when they differ.
pub fn check_dimension(features: &[f64], expected: usize) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::DimensionMismatch {
            got: features.len(),
            expected,
        });
    }
    Ok(())
}
