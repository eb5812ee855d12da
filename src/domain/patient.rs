//! Clinical input types for heart-disease risk prediction.
//!
//! Field set and value domains follow the heart failure prediction dataset
//! the bundled classifier was trained on (Age, Sex, ChestPainType, RestingBP,
//! Cholesterol, FastingBS, RestingECG, MaxHR, ExerciseAngina, Oldpeak, ST_Slope).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Boundary validation failure. Always names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Canonical feature/field name (e.g. `RestingBP`, `ChestPainType`).
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Range and widget metadata for a continuous clinical measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericSpec {
    /// Canonical feature name used in the encoded map and the schema.
    pub feature: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    /// Increment used by the form's arrow keys.
    pub step: f64,
    pub default: f64,
}

impl NumericSpec {
    /// Check that `value` is finite and within `[min, max]`.
    ///
    /// # Errors
    /// Returns a `ValidationError` naming this feature.
    pub fn check(&self, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::new(self.feature, "value must be a finite number"));
        }
        if value < self.min || value > self.max {
            return Err(ValidationError::new(
                self.feature,
                format!("{value} out of range [{}, {}]", self.min, self.max),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

pub const AGE: NumericSpec = NumericSpec {
    feature: "Age",
    label: "Age",
    unit: "years",
    min: 18.0,
    max: 100.0,
    step: 1.0,
    default: 40.0,
};

pub const RESTING_BP: NumericSpec = NumericSpec {
    feature: "RestingBP",
    label: "Resting BP",
    unit: "mmHg",
    min: 80.0,
    max: 200.0,
    step: 1.0,
    default: 120.0,
};

pub const CHOLESTEROL: NumericSpec = NumericSpec {
    feature: "Cholesterol",
    label: "Cholesterol",
    unit: "mg/dL",
    min: 100.0,
    max: 600.0,
    step: 1.0,
    default: 200.0,
};

pub const MAX_HR: NumericSpec = NumericSpec {
    feature: "MaxHR",
    label: "Max Heart Rate",
    unit: "bpm",
    min: 60.0,
    max: 220.0,
    step: 1.0,
    default: 150.0,
};

pub const OLDPEAK: NumericSpec = NumericSpec {
    feature: "Oldpeak",
    label: "Oldpeak",
    unit: "ST depression",
    min: 0.0,
    max: 6.0,
    step: 0.1,
    default: 1.0,
};

/// Feature name of the fasting blood sugar flag (1 if > 120 mg/dL).
pub const FASTING_BS: &str = "FastingBS";

/// A one-of-N clinical attribute.
///
/// `FIELD` is the prefix of the one-hot column (`<FIELD>_<value>`), and
/// `as_str` yields the exact value spelling used at training time.
pub trait Categorical: Copy + Sized + 'static {
    const FIELD: &'static str;
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// One-hot column name for this value.
    fn column(self) -> String {
        format!("{}_{}", Self::FIELD, self.as_str())
    }
}

fn parse_categorical<T: Categorical>(raw: &str) -> Result<T, ValidationError> {
    T::ALL
        .iter()
        .copied()
        .find(|v| v.as_str() == raw)
        .ok_or_else(|| {
            let allowed: Vec<&str> = T::ALL.iter().map(|v| v.as_str()).collect();
            ValidationError::new(
                T::FIELD,
                format!("unknown value {raw:?}, expected one of {}", allowed.join(", ")),
            )
        })
}

/// Implements `FromStr`, `Display` and the string serde bridge for a
/// categorical enum.
macro_rules! categorical_impls {
    ($ty:ty) => {
        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_categorical(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                parse_categorical(&s)
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> Self {
                v.as_str().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl Categorical for Sex {
    const FIELD: &'static str = "Sex";
    const ALL: &'static [Self] = &[Self::Male, Self::Female];

    fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }
}

categorical_impls!(Sex);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChestPainType {
    /// Atypical angina
    #[default]
    Ata,
    /// Non-anginal pain
    Nap,
    /// Typical angina
    Ta,
    /// Asymptomatic
    Asy,
}

impl Categorical for ChestPainType {
    const FIELD: &'static str = "ChestPainType";
    const ALL: &'static [Self] = &[Self::Ata, Self::Nap, Self::Ta, Self::Asy];

    fn as_str(self) -> &'static str {
        match self {
            Self::Ata => "ATA",
            Self::Nap => "NAP",
            Self::Ta => "TA",
            Self::Asy => "ASY",
        }
    }
}

categorical_impls!(ChestPainType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RestingEcg {
    #[default]
    Normal,
    /// ST-T wave abnormality
    St,
    /// Left ventricular hypertrophy
    Lvh,
}

impl Categorical for RestingEcg {
    const FIELD: &'static str = "RestingECG";
    const ALL: &'static [Self] = &[Self::Normal, Self::St, Self::Lvh];

    fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::St => "ST",
            Self::Lvh => "LVH",
        }
    }
}

categorical_impls!(RestingEcg);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExerciseAngina {
    #[default]
    Yes,
    No,
}

impl Categorical for ExerciseAngina {
    const FIELD: &'static str = "ExerciseAngina";
    const ALL: &'static [Self] = &[Self::Yes, Self::No];

    fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "Y",
            Self::No => "N",
        }
    }
}

categorical_impls!(ExerciseAngina);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StSlope {
    #[default]
    Up,
    Flat,
    Down,
}

impl Categorical for StSlope {
    const FIELD: &'static str = "ST_Slope";
    const ALL: &'static [Self] = &[Self::Up, Self::Flat, Self::Down];

    fn as_str(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Flat => "Flat",
            Self::Down => "Down",
        }
    }
}

categorical_impls!(StSlope);

/// One patient's clinical attributes as entered in the form.
///
/// Every field is required. Categorical fields are enums, so a constructed
/// value always holds exactly one member of its domain; numeric ranges are
/// checked by [`RawClinicalInput::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawClinicalInput {
    /// Age in years (18-100)
    pub age: f64,
    pub sex: Sex,
    pub chest_pain: ChestPainType,
    /// Resting blood pressure in mmHg (80-200)
    pub resting_bp: f64,
    /// Serum cholesterol in mg/dL (100-600)
    pub cholesterol: f64,
    /// Fasting blood sugar > 120 mg/dL: 0 = no, 1 = yes
    pub fasting_bs: u8,
    pub resting_ecg: RestingEcg,
    /// Maximum heart rate achieved (60-220)
    pub max_hr: f64,
    pub exercise_angina: ExerciseAngina,
    /// ST depression induced by exercise relative to rest (0.0-6.0)
    pub oldpeak: f64,
    pub st_slope: StSlope,
}

impl Default for RawClinicalInput {
    fn default() -> Self {
        Self {
            age: AGE.default,
            sex: Sex::default(),
            chest_pain: ChestPainType::default(),
            resting_bp: RESTING_BP.default,
            cholesterol: CHOLESTEROL.default,
            fasting_bs: 0,
            resting_ecg: RestingEcg::default(),
            max_hr: MAX_HR.default,
            exercise_angina: ExerciseAngina::default(),
            oldpeak: OLDPEAK.default,
            st_slope: StSlope::default(),
        }
    }
}

/// JSON keys accepted by [`RawClinicalInput::from_json`].
const JSON_FIELDS: [&str; 11] = [
    "age",
    "sex",
    "chest_pain",
    "resting_bp",
    "cholesterol",
    "fasting_bs",
    "resting_ecg",
    "max_hr",
    "exercise_angina",
    "oldpeak",
    "st_slope",
];

type JsonRecord = serde_json::Map<String, serde_json::Value>;

fn json_value<'a>(
    record: &'a JsonRecord,
    key: &str,
    field: &'static str,
) -> Result<&'a serde_json::Value, ValidationError> {
    record
        .get(key)
        .ok_or_else(|| ValidationError::new(field, format!("`{key}` is missing")))
}

fn json_number(record: &JsonRecord, key: &str, spec: &NumericSpec) -> Result<f64, ValidationError> {
    json_value(record, key, spec.feature)?
        .as_f64()
        .ok_or_else(|| ValidationError::new(spec.feature, format!("`{key}` must be a number")))
}

fn json_categorical<T: Categorical>(record: &JsonRecord, key: &str) -> Result<T, ValidationError> {
    let raw = json_value(record, key, T::FIELD)?
        .as_str()
        .ok_or_else(|| ValidationError::new(T::FIELD, format!("`{key}` must be a string")))?;
    parse_categorical(raw)
}

fn json_flag(record: &JsonRecord, key: &str) -> Result<u8, ValidationError> {
    match json_value(record, key, FASTING_BS)?.as_u64() {
        Some(0) => Ok(0),
        Some(1) => Ok(1),
        _ => Err(ValidationError::new(FASTING_BS, format!("`{key}` must be 0 or 1"))),
    }
}

impl RawClinicalInput {
    /// Parse and validate a JSON clinical record.
    ///
    /// Unlike plain serde decoding, every failure (wrong type, missing key,
    /// out-of-range value) comes back as a `ValidationError` naming the field.
    ///
    /// # Errors
    /// Returns a `ValidationError` for malformed JSON, unknown keys or any
    /// invalid field.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::new("input", format!("malformed JSON: {e}")))?;
        let serde_json::Value::Object(record) = value else {
            return Err(ValidationError::new("input", "expected a JSON object"));
        };
        if let Some(unknown) = record.keys().find(|k| !JSON_FIELDS.contains(&k.as_str())) {
            return Err(ValidationError::new(
                "input",
                format!("unknown field `{unknown}`"),
            ));
        }

        let input = Self {
            age: json_number(&record, "age", &AGE)?,
            sex: json_categorical(&record, "sex")?,
            chest_pain: json_categorical(&record, "chest_pain")?,
            resting_bp: json_number(&record, "resting_bp", &RESTING_BP)?,
            cholesterol: json_number(&record, "cholesterol", &CHOLESTEROL)?,
            fasting_bs: json_flag(&record, "fasting_bs")?,
            resting_ecg: json_categorical(&record, "resting_ecg")?,
            max_hr: json_number(&record, "max_hr", &MAX_HR)?,
            exercise_angina: json_categorical(&record, "exercise_angina")?,
            oldpeak: json_number(&record, "oldpeak", &OLDPEAK)?,
            st_slope: json_categorical(&record, "st_slope")?,
        };
        input.validate()?;
        Ok(input)
    }

    /// Validate numeric ranges and the binary flag. Fails on the first
    /// offending field.
    ///
    /// # Errors
    /// Returns a `ValidationError` carrying the field name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        AGE.check(self.age)?;
        RESTING_BP.check(self.resting_bp)?;
        CHOLESTEROL.check(self.cholesterol)?;
        if self.fasting_bs > 1 {
            return Err(ValidationError::new(
                FASTING_BS,
                format!("{} must be 0 or 1", self.fasting_bs),
            ));
        }
        MAX_HR.check(self.max_hr)?;
        OLDPEAK.check(self.oldpeak)?;
        Ok(())
    }
}
