//! Prediction service: orchestrates one risk assessment.
//!
//! This service coordinates:
//! - Boundary validation of the clinical input
//! - Feature encoding and schema alignment
//! - Scaling with the fitted scaler
//! - Classification and probability estimation

use std::sync::Arc;

use crate::adapters::artifacts::ModelArtifacts;
use crate::adapters::sklearn::StandardScaler;
use crate::domain::{align, encode, Diagnosis, ExpectedSchema, Prediction, RawClinicalInput};
use crate::ports::{Classifier, ModelError, Scaler};
use crate::CardioriskError;

/// Service for running the encode → align → scale → predict chain.
///
/// Holds the loaded artifacts read-only; every call is independent of the
/// previous ones, so one instance serves the whole process.
pub struct PredictionService<C, S>
where
    C: Classifier + ?Sized,
    S: Scaler,
{
    schema: Arc<ExpectedSchema>,
    scaler: Arc<S>,
    classifier: Arc<C>,
}

impl<C, S> Clone for PredictionService<C, S>
where
    C: Classifier + ?Sized,
    S: Scaler,
{
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            scaler: Arc::clone(&self.scaler),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

/// Service over artifacts loaded from a model directory.
pub type ArtifactPredictionService = PredictionService<dyn Classifier, StandardScaler>;

impl ArtifactPredictionService {
    /// Build the service from loaded artifacts.
    ///
    /// # Errors
    /// Returns error if the artifacts disagree on dimension.
    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self, CardioriskError> {
        Self::new(
            Arc::new(artifacts.schema),
            Arc::new(artifacts.scaler),
            Arc::from(artifacts.classifier),
        )
    }
}

impl<C, S> PredictionService<C, S>
where
    C: Classifier + ?Sized,
    S: Scaler,
{
    /// Create a new prediction service.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` if the scaler or classifier
    /// was fitted on a different number of columns than the schema has.
    pub fn new(
        schema: Arc<ExpectedSchema>,
        scaler: Arc<S>,
        classifier: Arc<C>,
    ) -> Result<Self, CardioriskError> {
        for got in [scaler.dimension(), classifier.dimension()] {
            if got != schema.len() {
                return Err(ModelError::DimensionMismatch {
                    got,
                    expected: schema.len(),
                }
                .into());
            }
        }

        Ok(Self {
            schema,
            scaler,
            classifier,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &ExpectedSchema {
        &self.schema
    }

    #[must_use]
    pub fn model_kind(&self) -> &'static str {
        self.classifier.kind()
    }

    /// Assess one patient.
    ///
    /// If the classifier has no probability estimation, the probability is a
    /// fixed placeholder (0.7 for a positive label, 0.2 otherwise) and the
    /// prediction is marked as such.
    ///
    /// # Errors
    /// Returns `CardioriskError::Validation` for out-of-range input, or a
    /// model error if the scaler/classifier rejects the vector.
    pub fn predict(&self, input: &RawClinicalInput) -> Result<Diagnosis, CardioriskError> {
        input.validate()?;

        let features = encode(input);
        let vector = align(&features, &self.schema);
        tracing::debug!(
            "Aligned {} encoded features to {} schema columns",
            features.len(),
            vector.len()
        );

        let scaled = self.scaler.transform(&vector)?;
        let label = self.classifier.predict(&scaled)?;

        let prediction = match self.classifier.predict_proba(&scaled)? {
            Some(probability) => Prediction::from_model(label, probability),
            None => {
                tracing::warn!(
                    "Classifier {} has no probability estimate; reporting placeholder probability",
                    self.classifier.kind()
                );
                Prediction::placeholder(label)
            }
        };

        let diagnosis = Diagnosis::new(prediction, self.classifier.kind());
        tracing::info!(
            "Prediction complete: label={}, probability={:.1}%, source={:?}, risk={}",
            diagnosis.prediction.label,
            diagnosis.prediction.percent(),
            diagnosis.prediction.source,
            diagnosis.risk_level
        );

        Ok(diagnosis)
    }
}
