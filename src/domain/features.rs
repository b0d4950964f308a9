//! Feature types for lifestyle-disease risk prediction.
//!
//! Fourteen clinical and lifestyle measurements, kept in the exact column
//! order the fitted model was trained on.

use serde::{Deserialize, Serialize};

use crate::RiskscopeError;

/// Number of input features the model consumes.
pub const FEATURE_COUNT: usize = 14;

/// Feature names in model column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "gender",
    "bmi",
    "daily_steps",
    "sleep_hours",
    "water_intake",
    "calories",
    "smoker",
    "alcohol",
    "resting_hr",
    "systolic_bp",
    "diastolic_bp",
    "cholesterol",
    "family_history",
];

/// One column of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureField {
    Age,
    /// 1 = male, 0 = female
    Gender,
    Bmi,
    DailySteps,
    SleepHours,
    /// Litres per day
    WaterIntake,
    Calories,
    /// 1 = yes, 0 = no
    Smoker,
    /// 1 = yes, 0 = no
    Alcohol,
    RestingHr,
    SystolicBp,
    DiastolicBp,
    Cholesterol,
    /// 1 = yes, 0 = no
    FamilyHistory,
}

impl FeatureField {
    /// All fields in model column order.
    pub const ALL: [FeatureField; FEATURE_COUNT] = [
        Self::Age,
        Self::Gender,
        Self::Bmi,
        Self::DailySteps,
        Self::SleepHours,
        Self::WaterIntake,
        Self::Calories,
        Self::Smoker,
        Self::Alcohol,
        Self::RestingHr,
        Self::SystolicBp,
        Self::DiastolicBp,
        Self::Cholesterol,
        Self::FamilyHistory,
    ];

    /// Column index in the feature vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Look up a field by its identifier (`"bmi"`, `"family_history"`, ...).
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Stable identifier, identical to the model's column name.
    #[must_use]
    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Age => "Age",
            Self::Gender => "Gender",
            Self::Bmi => "BMI",
            Self::DailySteps => "Daily Steps",
            Self::SleepHours => "Sleep Hours",
            Self::WaterIntake => "Water Intake (L)",
            Self::Calories => "Calories Consumed",
            Self::Smoker => "Smoker",
            Self::Alcohol => "Alcohol",
            Self::RestingHr => "Resting Heart Rate",
            Self::SystolicBp => "Systolic BP",
            Self::DiastolicBp => "Diastolic BP",
            Self::Cholesterol => "Cholesterol",
            Self::FamilyHistory => "Family History",
        }
    }

    /// Whether the field is a {0, 1} encoded category.
    #[must_use]
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Gender | Self::Smoker | Self::Alcohol | Self::FamilyHistory
        )
    }

    /// Accepted input range `(min, max)`, inclusive.
    #[must_use]
    pub fn input_range(self) -> (f64, f64) {
        match self {
            Self::Age => (1.0, 120.0),
            Self::Bmi => (10.0, 50.0),
            Self::DailySteps => (0.0, 30_000.0),
            Self::SleepHours => (0.0, 12.0),
            Self::WaterIntake => (0.0, 10.0),
            Self::Calories => (1_000.0, 6_000.0),
            Self::RestingHr => (40.0, 150.0),
            Self::SystolicBp => (80.0, 200.0),
            Self::DiastolicBp => (50.0, 130.0),
            Self::Cholesterol => (100.0, 400.0),
            Self::Gender | Self::Smoker | Self::Alcohol | Self::FamilyHistory => (0.0, 1.0),
        }
    }
}

impl std::fmt::Display for FeatureField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated, fixed-order feature vector.
///
/// Every entry is a finite number; categorical fields are already encoded
/// to {0, 1}. Values are immutable: substitutions return a new vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from raw values in model column order.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the slice is not exactly 14 finite numbers.
    pub fn from_slice(values: &[f64]) -> Result<Self, RiskscopeError> {
        if values.len() != FEATURE_COUNT {
            return Err(RiskscopeError::InvalidInput(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                values.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(RiskscopeError::InvalidInput(format!(
                "Feature `{}` is not a finite number",
                FEATURE_NAMES[i]
            )));
        }

        let mut out = [0.0; FEATURE_COUNT];
        out.copy_from_slice(values);
        Ok(Self { values: out })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, field: FeatureField) -> f64 {
        self.values[field.index()]
    }

    /// Copy of this vector with one field replaced.
    #[must_use]
    pub fn with_value(&self, field: FeatureField, value: f64) -> Self {
        let mut values = self.values;
        values[field.index()] = value;
        Self { values }
    }

    /// Iterate `(field, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureField, f64)> + '_ {
        FeatureField::ALL.iter().copied().zip(self.values.iter().copied())
    }

    /// Check every field against its accepted input range.
    ///
    /// # Errors
    /// Returns all violations found.
    pub fn validate_ranges(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (field, value) in self.iter() {
            if field.is_boolean() {
                if value != 0.0 && value != 1.0 {
                    errors.push(format!("{} {} must be 0 or 1", field.label(), value));
                }
                continue;
            }
            let (min, max) = field.input_range();
            if !(min..=max).contains(&value) {
                errors.push(format!(
                    "{} {} out of range [{}, {}]",
                    field.label(),
                    value,
                    min,
                    max
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Min-max normalise each field into [0, 1] against its input range.
    ///
    /// Values outside the range are clamped.
    #[must_use]
    pub fn radar_profile(&self) -> Vec<RadarPoint> {
        self.iter()
            .map(|(field, value)| {
                let (min, max) = field.input_range();
                let normalized = ((value - min) / (max - min)).clamp(0.0, 1.0);
                RadarPoint {
                    field,
                    value,
                    normalized,
                }
            })
            .collect()
    }
}

impl Default for FeatureVector {
    /// The dashboard's initial form values.
    fn default() -> Self {
        Self {
            values: [
                30.0, 1.0, 25.0, 8_000.0, 7.0, 2.0, 2_200.0, 0.0, 0.0, 75.0, 120.0, 80.0, 200.0,
                0.0,
            ],
        }
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = RiskscopeError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(v: FeatureVector) -> Self {
        v.values.to_vec()
    }
}

/// One axis of the radar profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadarPoint {
    pub field: FeatureField,
    pub value: f64,
    pub normalized: f64,
}
