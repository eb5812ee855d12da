//! Feature vector builder.
//!
//! Turns a [`RawClinicalInput`] into the dense, fixed-order numeric vector the
//! trained scaler and classifier expect, in two pure steps:
//!
//! 1. [`encode`]: numeric fields pass through under their base names and each
//!    categorical field becomes a single one-hot entry `<Field>_<Value> = 1`.
//!    The map is sparse: unselected one-hot columns are absent, not zero.
//! 2. [`align`]: walk the [`ExpectedSchema`] in order, taking each column from
//!    the map or `0.0` when absent. Map entries the schema does not name are
//!    dropped.

use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::patient::{self, Categorical, RawClinicalInput};

/// Sparse mapping from feature name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedFeatureMap {
    values: BTreeMap<String, f64>,
}

impl EncodedFeatureMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for EncodedFeatureMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered column names the model was trained on.
///
/// Loaded once from the schema artifact and treated as immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedSchema {
    columns: Vec<String>,
}

impl ExpectedSchema {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of `name` in the schema, if present.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First column name that appears more than once.
    #[must_use]
    pub fn first_duplicate(&self) -> Option<&str> {
        let mut seen = std::collections::BTreeSet::new();
        self.columns
            .iter()
            .find(|c| !seen.insert(c.as_str()))
            .map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExpectedSchema {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Dense numeric vector in schema order, ready for the scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DenseFeatureVector(Vec<f64>);

impl DenseFeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for DenseFeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

fn insert_one_hot<T: Categorical>(map: &mut EncodedFeatureMap, value: T) {
    map.insert(value.column(), 1.0);
}

/// Encode one patient record into its sparse feature map.
///
/// Produces exactly 11 entries: 6 numeric/binary pass-through values and one
/// one-hot indicator per categorical field.
#[must_use]
pub fn encode(input: &RawClinicalInput) -> EncodedFeatureMap {
    let mut map = EncodedFeatureMap::new();

    map.insert(patient::AGE.feature, input.age);
    map.insert(patient::RESTING_BP.feature, input.resting_bp);
    map.insert(patient::CHOLESTEROL.feature, input.cholesterol);
    map.insert(patient::FASTING_BS, f64::from(input.fasting_bs));
    map.insert(patient::MAX_HR.feature, input.max_hr);
    map.insert(patient::OLDPEAK.feature, input.oldpeak);

    insert_one_hot(&mut map, input.sex);
    insert_one_hot(&mut map, input.chest_pain);
    insert_one_hot(&mut map, input.resting_ecg);
    insert_one_hot(&mut map, input.exercise_angina);
    insert_one_hot(&mut map, input.st_slope);

    map
}

/// Align a feature map to the schema, filling absent columns with `0.0`.
///
/// The output always has `schema.len()` entries in schema order.
#[must_use]
pub fn align(features: &EncodedFeatureMap, schema: &ExpectedSchema) -> DenseFeatureVector {
    DenseFeatureVector(
        schema
            .columns()
            .iter()
            .map(|col| features.get(col).unwrap_or(0.0))
            .collect(),
    )
}

/// `align(encode(input), schema)`.
#[must_use]
pub fn build(input: &RawClinicalInput, schema: &ExpectedSchema) -> DenseFeatureVector {
    align(&encode(input), schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patient::{ChestPainType, ExerciseAngina, RestingEcg, Sex, StSlope};

    fn scenario_input() -> RawClinicalInput {
        RawClinicalInput {
            age: 40.0,
            sex: Sex::Male,
            chest_pain: ChestPainType::Ata,
            resting_bp: 120.0,
            cholesterol: 200.0,
            fasting_bs: 0,
            resting_ecg: RestingEcg::Normal,
            max_hr: 150.0,
            exercise_angina: ExerciseAngina::No,
            oldpeak: 1.0,
            st_slope: StSlope::Up,
        }
    }

    fn scenario_schema() -> ExpectedSchema {
        [
            "Age",
            "RestingBP",
            "Cholesterol",
            "FastingBS",
            "MaxHR",
            "Oldpeak",
            "Sex_M",
            "Sex_F",
            "ChestPainType_ATA",
            "ExerciseAngina_N",
            "ST_Slope_Up",
        ]
        .into_iter()
        .collect()
    }

    /// Column order of the heart.csv one-hot export.
    fn full_schema() -> ExpectedSchema {
        [
            "Age",
            "RestingBP",
            "Cholesterol",
            "FastingBS",
            "MaxHR",
            "Oldpeak",
            "Sex_F",
            "Sex_M",
            "ChestPainType_ASY",
            "ChestPainType_ATA",
            "ChestPainType_NAP",
            "ChestPainType_TA",
            "RestingECG_LVH",
            "RestingECG_Normal",
            "RestingECG_ST",
            "ExerciseAngina_N",
            "ExerciseAngina_Y",
            "ST_Slope_Down",
            "ST_Slope_Flat",
            "ST_Slope_Up",
        ]
        .into_iter()
        .collect()
    }

    fn all_inputs() -> Vec<RawClinicalInput> {
        let mut out = Vec::new();
        for &sex in Sex::ALL {
            for &chest_pain in ChestPainType::ALL {
                for &resting_ecg in RestingEcg::ALL {
                    for &exercise_angina in ExerciseAngina::ALL {
                        for &st_slope in StSlope::ALL {
                            out.push(RawClinicalInput {
                                sex,
                                chest_pain,
                                resting_ecg,
                                exercise_angina,
                                st_slope,
                                ..scenario_input()
                            });
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_scenario_vector() {
        let v = build(&scenario_input(), &scenario_schema());
        assert_eq!(
            v.as_slice(),
            &[40.0, 120.0, 200.0, 0.0, 150.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_unselected_one_hot_column_is_zero() {
        let mut columns = scenario_schema().columns().to_vec();
        columns.push("ChestPainType_TA".to_string());
        let schema = ExpectedSchema::new(columns);

        let v = build(&scenario_input(), &schema);
        assert_eq!(v.len(), 12);
        assert_eq!(v[11], 0.0);
    }

    #[test]
    fn test_encode_entry_count_and_sparsity() {
        let map = encode(&scenario_input());
        assert_eq!(map.len(), 11);
        assert_eq!(map.get("Sex_M"), Some(1.0));
        assert!(!map.contains("Sex_F"));
        assert_eq!(map.get("FastingBS"), Some(0.0));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let input = scenario_input();
        assert_eq!(encode(&input), encode(&input));
    }

    #[test]
    fn test_output_length_matches_schema_length() {
        let full = full_schema();
        for n in 0..=full.len() + 3 {
            let mut columns: Vec<String> = full.columns().iter().take(n).cloned().collect();
            while columns.len() < n {
                columns.push(format!("Unknown_{}", columns.len()));
            }
            let schema = ExpectedSchema::new(columns);
            assert_eq!(build(&scenario_input(), &schema).len(), n);
        }
    }

    #[test]
    fn test_exactly_one_hot_per_categorical_field() {
        let schema = full_schema();
        let prefixes = [
            Sex::FIELD,
            ChestPainType::FIELD,
            RestingEcg::FIELD,
            ExerciseAngina::FIELD,
            StSlope::FIELD,
        ];

        for input in all_inputs() {
            let v = build(&input, &schema);
            for prefix in prefixes {
                let hot: Vec<f64> = schema
                    .columns()
                    .iter()
                    .zip(v.iter())
                    .filter(|(c, _)| c.starts_with(&format!("{prefix}_")))
                    .map(|(_, x)| *x)
                    .collect();
                assert_eq!(hot.iter().filter(|&&x| x == 1.0).count(), 1, "{prefix}");
                assert_eq!(hot.iter().filter(|&&x| x == 0.0).count(), hot.len() - 1);
            }
        }
    }

    #[test]
    fn test_permuting_schema_permutes_output() {
        let map = encode(&scenario_input());
        let schema = full_schema();
        let n = schema.len();

        // Rotations and a reversal cover every column in every position.
        let mut permutations: Vec<Vec<String>> = (0..n)
            .map(|shift| {
                let mut cols = schema.columns().to_vec();
                cols.rotate_left(shift);
                cols
            })
            .collect();
        permutations.push(schema.columns().iter().rev().cloned().collect());

        for cols in permutations {
            let permuted = ExpectedSchema::new(cols);
            let v = align(&map, &permuted);
            for (i, col) in permuted.columns().iter().enumerate() {
                assert_eq!(v[i], map.get(col).unwrap_or(0.0));
            }
        }
    }

    #[test]
    fn test_extra_keys_do_not_change_alignment() {
        let schema = full_schema();
        let map = encode(&scenario_input());
        let baseline = align(&map, &schema);

        let mut noisy = map.clone();
        noisy.insert("PatientName_Doe", 1.0);
        noisy.insert("Smoker", 1.0);
        noisy.insert("ChestPainType_Other", 7.0);
        assert_eq!(align(&noisy, &schema), baseline);
    }

    #[test]
    fn test_map_insertion_order_is_irrelevant() {
        let schema = full_schema();
        let forward: EncodedFeatureMap = encode(&scenario_input()).iter().collect();
        let mut pairs: Vec<(&str, f64)> = forward.iter().collect();
        pairs.reverse();
        let backward: EncodedFeatureMap = pairs.into_iter().collect();
        assert_eq!(align(&forward, &schema), align(&backward, &schema));
    }

    #[test]
    fn test_empty_schema_gives_empty_vector() {
        let v = build(&scenario_input(), &ExpectedSchema::new(Vec::new()));
        assert!(v.is_empty());
    }

    #[test]
    fn test_first_duplicate() {
        let schema: ExpectedSchema = ["Age", "Sex_M", "Age"].into_iter().collect();
        assert_eq!(schema.first_duplicate(), Some("Age"));
        assert_eq!(full_schema().first_duplicate(), None);
    }
}
