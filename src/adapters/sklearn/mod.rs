//! Scikit-learn compatible adapters: implementations of `Scaler` and
//! `Classifier` over parameters exported from a fitted Python pipeline.
//!
//! The exported JSON layout is:
//!
//! - `scaler.json`: `{"mean": [...], "scale": [...]}` (`StandardScaler`
//!   `mean_` and `scale_`).
//! - `model.json`: tagged by `"kind"`:
//!   - `k_neighbors`: `n_neighbors`, `weights`, `samples` (the scaled training
//!     rows), `labels`
//!   - `logistic_regression`: `coefficients`, `intercept`
//!   - `linear_svc`: `coefficients`, `intercept` (no probability output)

use serde::{Deserialize, Serialize};

use crate::ports::{check_dimension, Classifier, ModelError, Scaler};

/// Scaler parameters as exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Classifier parameters as exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportedModel {
    KNeighbors {
        n_neighbors: usize,
        #[serde(default)]
        weights: NeighborWeights,
        samples: Vec<Vec<f64>>,
        labels: Vec<u8>,
    },
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    LinearSvc {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl ExportedModel {
    /// Validate the parameters and build the matching classifier.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidParameters` if the export is inconsistent.
    pub fn into_classifier(self) -> Result<Box<dyn Classifier>, ModelError> {
        Ok(match self {
            Self::KNeighbors {
                n_neighbors,
                weights,
                samples,
                labels,
            } => Box::new(KNeighborsClassifier::new(
                n_neighbors,
                weights,
                samples,
                labels,
            )?),
            Self::LogisticRegression {
                coefficients,
                intercept,
            } => Box::new(LogisticRegression::new(coefficients, intercept)?),
            Self::LinearSvc {
                coefficients,
                intercept,
            } => Box::new(LinearSvc::new(coefficients, intercept)?),
        })
    }
}

fn ensure_finite(name: &str, values: &[f64]) -> Result<(), ModelError> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(ModelError::InvalidParameters(format!(
            "{name}[{i}] is not a finite number"
        )));
    }
    Ok(())
}

/// Standardization: `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// # Errors
    /// Returns `ModelError::InvalidParameters` if the vectors differ in length
    /// or contain non-finite values.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() {
            return Err(ModelError::InvalidParameters(format!(
                "scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        ensure_finite("mean", &mean)?;
        ensure_finite("scale", &scale)?;
        Ok(Self { mean, scale })
    }
}

impl TryFrom<ExportedScaler> for StandardScaler {
    type Error = ModelError;

    fn try_from(exported: ExportedScaler) -> Result<Self, Self::Error> {
        Self::new(exported.mean, exported.scale)
    }
}

impl Scaler for StandardScaler {
    fn dimension(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_dimension(features, self.dimension())?;
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (mean, scale))| {
                // Constant training columns are exported with scale 0.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

/// Neighbour vote weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    #[default]
    Uniform,
    /// Inverse distance; exact matches take the whole vote.
    Distance,
}

/// k-nearest-neighbours classifier over stored (scaled) training rows.
#[derive(Debug, Clone)]
pub struct KNeighborsClassifier {
    n_neighbors: usize,
    weights: NeighborWeights,
    samples: Vec<Vec<f64>>,
    labels: Vec<u8>,
}

impl KNeighborsClassifier {
    /// # Errors
    /// Returns `ModelError::InvalidParameters` for an empty or ragged sample
    /// set, a label count mismatch, non-binary labels, or `n_neighbors`
    /// outside `1..=samples.len()`.
    pub fn new(
        n_neighbors: usize,
        weights: NeighborWeights,
        samples: Vec<Vec<f64>>,
        labels: Vec<u8>,
    ) -> Result<Self, ModelError> {
        let Some(first) = samples.first() else {
            return Err(ModelError::InvalidParameters(
                "k-neighbours model has no samples".into(),
            ));
        };
        let dim = first.len();
        for (i, row) in samples.iter().enumerate() {
            if row.len() != dim {
                return Err(ModelError::InvalidParameters(format!(
                    "sample {i} has {} columns, expected {dim}",
                    row.len()
                )));
            }
            ensure_finite("samples", row)?;
        }
        if labels.len() != samples.len() {
            return Err(ModelError::InvalidParameters(format!(
                "{} labels for {} samples",
                labels.len(),
                samples.len()
            )));
        }
        if labels.iter().any(|&l| l > 1) {
            return Err(ModelError::InvalidParameters(
                "labels must be 0 or 1".into(),
            ));
        }
        if n_neighbors == 0 || n_neighbors > samples.len() {
            return Err(ModelError::InvalidParameters(format!(
                "n_neighbors must be in 1..={}, got {n_neighbors}",
                samples.len()
            )));
        }

        Ok(Self {
            n_neighbors,
            weights,
            samples,
            labels,
        })
    }

    /// Weighted share of positive labels among the nearest neighbours.
    fn positive_share(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_dimension(features, self.dimension())?;

        let mut distances: Vec<(f64, usize)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, row)| (euclidean(row, features), i))
            .collect();
        // Ties resolve to the earlier training row.
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let nearest = &distances[..self.n_neighbors];

        let weight = |d: f64| -> f64 {
            match self.weights {
                NeighborWeights::Uniform => 1.0,
                NeighborWeights::Distance => 1.0 / d,
            }
        };

        let exact: Vec<&(f64, usize)> = nearest.iter().filter(|(d, _)| *d == 0.0).collect();
        let (positive, total) = if self.weights == NeighborWeights::Distance && !exact.is_empty()
        {
            let positive = exact.iter().filter(|(_, i)| self.labels[*i] == 1).count();
            (positive as f64, exact.len() as f64)
        } else {
            nearest.iter().fold((0.0, 0.0), |(pos, tot), &(d, i)| {
                let w = weight(d);
                let pos = if self.labels[i] == 1 { pos + w } else { pos };
                (pos, tot + w)
            })
        };

        Ok(positive / total)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl Classifier for KNeighborsClassifier {
    fn kind(&self) -> &'static str {
        "k_neighbors"
    }

    fn dimension(&self) -> usize {
        self.samples[0].len()
    }

    fn predict(&self, features: &[f64]) -> Result<u8, ModelError> {
        // A 50/50 vote goes to the lower class.
        Ok(u8::from(self.positive_share(features)? > 0.5))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<f64>, ModelError> {
        self.positive_share(features).map(Some)
    }
}

/// Shared linear decision function `w·x + b`.
#[derive(Debug, Clone)]
struct LinearDecision {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearDecision {
    fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        if coefficients.is_empty() {
            return Err(ModelError::InvalidParameters(
                "linear model has no coefficients".into(),
            ));
        }
        ensure_finite("coefficients", &coefficients)?;
        ensure_finite("intercept", &[intercept])?;
        Ok(Self {
            coefficients,
            intercept,
        })
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_dimension(features, self.coefficients.len())?;
        Ok(self
            .coefficients
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept)
    }
}

/// Logistic regression with probability output.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    decision: LinearDecision,
}

impl LogisticRegression {
    /// # Errors
    /// Returns `ModelError::InvalidParameters` for empty or non-finite parameters.
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        Ok(Self {
            decision: LinearDecision::new(coefficients, intercept)?,
        })
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn dimension(&self) -> usize {
        self.decision.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<u8, ModelError> {
        Ok(u8::from(self.decision.evaluate(features)? > 0.0))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<f64>, ModelError> {
        Ok(Some(sigmoid(self.decision.evaluate(features)?)))
    }
}

/// Linear support vector classifier. Has no probability estimation.
#[derive(Debug, Clone)]
pub struct LinearSvc {
    decision: LinearDecision,
}

impl LinearSvc {
    /// # Errors
    /// Returns `ModelError::InvalidParameters` for empty or non-finite parameters.
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self, ModelError> {
        Ok(Self {
            decision: LinearDecision::new(coefficients, intercept)?,
        })
    }
}

impl Classifier for LinearSvc {
    fn kind(&self) -> &'static str {
        "linear_svc"
    }

    fn dimension(&self) -> usize {
        self.decision.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<u8, ModelError> {
        Ok(u8::from(self.decision.evaluate(features)? > 0.0))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<f64>, ModelError> {
        // Validate the row even though there is nothing to return.
        self.decision.evaluate(features)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cluster_knn(weights: NeighborWeights) -> KNeighborsClassifier {
        KNeighborsClassifier::new(
            3,
            weights,
            vec![
                vec![0.0, 0.0],
                vec![0.1, 0.0],
                vec![0.0, 0.1],
                vec![5.0, 5.0],
                vec![5.1, 5.0],
                vec![5.0, 5.1],
            ],
            vec![0, 0, 0, 1, 1, 1],
        )
        .expect("valid model")
    }

    #[test]
    fn test_standard_scaler_transform() {
        let scaler = StandardScaler::new(vec![10.0, 0.0], vec![2.0, 0.0]).expect("valid");
        let out = scaler.transform(&[14.0, 3.0]).expect("transform");
        assert!((out[0] - 2.0).abs() < 1e-12);
        // zero scale behaves as identity scaling
        assert!((out[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_standard_scaler_rejects_wrong_dimension() {
        let scaler = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).expect("valid");
        assert_eq!(
            scaler.transform(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch {
                got: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn test_standard_scaler_rejects_mismatched_parameters() {
        assert!(StandardScaler::new(vec![0.0; 3], vec![1.0; 2]).is_err());
        assert!(StandardScaler::new(vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn test_knn_uniform_votes() {
        let knn = two_cluster_knn(NeighborWeights::Uniform);
        assert_eq!(knn.predict(&[0.05, 0.05]).expect("predict"), 0);
        assert_eq!(knn.predict(&[4.9, 5.2]).expect("predict"), 1);
        let p = knn.predict_proba(&[5.0, 5.0]).expect("proba").expect("supported");
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_knn_mixed_neighbourhood_share() {
        let knn = KNeighborsClassifier::new(
            3,
            NeighborWeights::Uniform,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]],
            vec![1, 0, 1, 0],
        )
        .expect("valid");
        let p = knn.predict_proba(&[1.0]).expect("proba").expect("supported");
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(knn.predict(&[1.0]).expect("predict"), 1);
    }

    #[test]
    fn test_knn_even_split_goes_to_negative_class() {
        let knn = KNeighborsClassifier::new(
            2,
            NeighborWeights::Uniform,
            vec![vec![0.0], vec![2.0]],
            vec![1, 0],
        )
        .expect("valid");
        assert_eq!(knn.predict(&[1.0]).expect("predict"), 0);
    }

    #[test]
    fn test_knn_distance_weights_exact_match_dominates() {
        let knn = KNeighborsClassifier::new(
            3,
            NeighborWeights::Distance,
            vec![vec![0.0], vec![0.5], vec![0.6]],
            vec![1, 0, 0],
        )
        .expect("valid");
        let p = knn.predict_proba(&[0.0]).expect("proba").expect("supported");
        assert!((p - 1.0).abs() < 1e-12);

        // Away from the sample, closer neighbours weigh more.
        let p = knn.predict_proba(&[0.1]).expect("proba").expect("supported");
        let expected = 10.0 / (10.0 + 1.0 / 0.4 + 1.0 / 0.5);
        assert!((p - expected).abs() < 1e-9);
    }

    #[test]
    fn test_knn_rejects_invalid_parameters() {
        assert!(KNeighborsClassifier::new(1, NeighborWeights::Uniform, vec![], vec![]).is_err());
        assert!(KNeighborsClassifier::new(
            3,
            NeighborWeights::Uniform,
            vec![vec![0.0], vec![1.0]],
            vec![0, 1]
        )
        .is_err());
        assert!(KNeighborsClassifier::new(
            1,
            NeighborWeights::Uniform,
            vec![vec![0.0], vec![1.0, 2.0]],
            vec![0, 1]
        )
        .is_err());
        assert!(KNeighborsClassifier::new(
            1,
            NeighborWeights::Uniform,
            vec![vec![0.0]],
            vec![2]
        )
        .is_err());
    }

    #[test]
    fn test_logistic_regression_probability() {
        let model = LogisticRegression::new(vec![1.0, -1.0], 0.0).expect("valid");
        let p = model.predict_proba(&[0.0, 0.0]).expect("proba").expect("supported");
        assert!((p - 0.5).abs() < 1e-12);
        assert_eq!(model.predict(&[0.0, 0.0]).expect("predict"), 0);
        assert_eq!(model.predict(&[2.0, 0.0]).expect("predict"), 1);
    }

    #[test]
    fn test_linear_svc_has_no_probability() {
        let model = LinearSvc::new(vec![1.0], -1.0).expect("valid");
        assert_eq!(model.predict_proba(&[3.0]).expect("proba"), None);
        assert_eq!(model.predict(&[3.0]).expect("predict"), 1);
        assert!(model.predict_proba(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_exported_model_tags() {
        let json = r#"{"kind":"linear_svc","coefficients":[0.5,0.5],"intercept":0.0}"#;
        let exported: ExportedModel = serde_json::from_str(json).expect("parse");
        let model = exported.into_classifier().expect("build");
        assert_eq!(model.kind(), "linear_svc");
        assert_eq!(model.dimension(), 2);

        let json = r#"{"kind":"k_neighbors","n_neighbors":1,"samples":[[0.0]],"labels":[1]}"#;
        let exported: ExportedModel = serde_json::from_str(json).expect("parse");
        let model = exported.into_classifier().expect("build");
        assert_eq!(model.kind(), "k_neighbors");
        assert_eq!(model.predict(&[3.0]).expect("predict"), 1);
    }
}
