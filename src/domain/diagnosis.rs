//! Diagnosis result types.
//!
//! Represents the classifier output and how it is presented to the clinician.

use serde::{Deserialize, Serialize};

/// Probability assumed for a positive label when the model cannot estimate one.
pub const PLACEHOLDER_POSITIVE_PROBABILITY: f64 = 0.7;

/// Probability assumed for a negative label when the model cannot estimate one.
pub const PLACEHOLDER_NEGATIVE_PROBABILITY: f64 = 0.2;

/// Risk classification for heart disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Classifier predicted no heart disease
    Low,
    /// Classifier predicted heart disease
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Self::High
        } else {
            Self::Low
        }
    }

    /// Panel headline.
    #[must_use]
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Low => "Maintain Good Health",
            Self::High => "High Risk Detected",
        }
    }

    /// Recommended actions shown under the headline.
    #[must_use]
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Self::Low => &[
                "Balanced Diet",
                "Regular Exercise",
                "Annual Health Checkup",
                "Maintain Healthy Weight",
                "Stay Hydrated",
            ],
            Self::High => &[
                "Consult Cardiologist Immediately",
                "Reduce Salt Intake",
                "Avoid Smoking & Alcohol",
                "Daily 30 min Walk",
                "Monitor Blood Pressure Regularly",
            ],
        }
    }

    /// Get the associated color for TUI display (RGB).
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Low => (46, 204, 113),  // #2ECC71
            Self::High => (231, 76, 60),  // #E74C3C
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Where the reported probability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilitySource {
    /// The classifier's own probability estimate.
    Model,
    /// Fixed value substituted because the classifier has no probability
    /// estimate. Not a model output; must be shown as an estimate.
    Placeholder,
}

/// Raw classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 0 = no disease, 1 = disease
    pub label: u8,

    /// Probability of the positive class (0.0 to 1.0)
    pub probability: f64,

    pub source: ProbabilitySource,
}

impl Prediction {
    #[must_use]
    pub fn from_model(label: u8, probability: f64) -> Self {
        Self {
            label,
            probability: probability.clamp(0.0, 1.0),
            source: ProbabilitySource::Model,
        }
    }

    /// Prediction for a model without probability estimates.
    #[must_use]
    pub fn placeholder(label: u8) -> Self {
        let probability = if label == 1 {
            PLACEHOLDER_POSITIVE_PROBABILITY
        } else {
            PLACEHOLDER_NEGATIVE_PROBABILITY
        };
        Self {
            label,
            probability,
            source: ProbabilitySource::Placeholder,
        }
    }

    #[must_use]
    pub fn is_estimated(&self) -> bool {
        self.source == ProbabilitySource::Placeholder
    }

    /// Gauge value in percent.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.probability * 100.0
    }

    /// Gauge turns to the danger color strictly above 50%.
    #[must_use]
    pub fn exceeds_gauge_threshold(&self) -> bool {
        self.probability > 0.5
    }
}

/// A completed risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub prediction: Prediction,

    pub risk_level: RiskLevel,

    /// Classifier family that produced the prediction (e.g. `k_neighbors`)
    pub model_kind: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Diagnosis {
    #[must_use]
    pub fn new(prediction: Prediction, model_kind: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::from_label(prediction.label),
            prediction,
            model_kind: model_kind.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
