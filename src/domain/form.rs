//! Boundary mapping from free-text form input to an encoded feature vector.

use serde::{Deserialize, Serialize};

use super::features::{FeatureField, FeatureVector, FEATURE_COUNT};
use crate::RiskscopeError;

/// Raw form input as a user enters it.
///
/// Categorical answers are free text ("Male"/"Female", "Yes"/"No");
/// `to_vector` encodes them to {0, 1}. Missing fields fall back to the
/// dashboard defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub age: f64,
    pub gender: String,
    pub bmi: f64,
    pub daily_steps: f64,
    pub sleep_hours: f64,
    pub water_intake: f64,
    pub calories: f64,
    pub smoker: String,
    pub alcohol: String,
    pub resting_hr: f64,
    pub systolic_bp: f64,
    pub diastolic_bp: f64,
    pub cholesterol: f64,
    pub family_history: String,
}

impl Default for PatientForm {
    fn default() -> Self {
        Self {
            age: 30.0,
            gender: "Male".to_string(),
            bmi: 25.0,
            daily_steps: 8_000.0,
            sleep_hours: 7.0,
            water_intake: 2.0,
            calories: 2_200.0,
            smoker: "No".to_string(),
            alcohol: "No".to_string(),
            resting_hr: 75.0,
            systolic_bp: 120.0,
            diastolic_bp: 80.0,
            cholesterol: 200.0,
            family_history: "No".to_string(),
        }
    }
}

impl PatientForm {
    /// Encode the form into model column order.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an unrecognised category or a non-finite number.
    pub fn to_vector(&self) -> Result<FeatureVector, RiskscopeError> {
        let values: [f64; FEATURE_COUNT] = [
            self.age,
            encode_gender(&self.gender)?,
            self.bmi,
            self.daily_steps,
            self.sleep_hours,
            self.water_intake,
            self.calories,
            encode_yes_no(FeatureField::Smoker, &self.smoker)?,
            encode_yes_no(FeatureField::Alcohol, &self.alcohol)?,
            self.resting_hr,
            self.systolic_bp,
            self.diastolic_bp,
            self.cholesterol,
            encode_yes_no(FeatureField::FamilyHistory, &self.family_history)?,
        ];
        FeatureVector::from_slice(&values)
    }
}

/// "Male" → 1, "Female" → 0.
///
/// # Errors
/// Returns `InvalidInput` for anything else.
pub fn encode_gender(value: &str) -> Result<f64, RiskscopeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "male" | "m" | "1" => Ok(1.0),
        "female" | "f" | "0" => Ok(0.0),
        other => Err(RiskscopeError::InvalidInput(format!(
            "Gender must be Male or Female, got `{other}`"
        ))),
    }
}

/// "Yes" → 1, "No" → 0.
///
/// # Errors
/// Returns `InvalidInput` for anything else.
pub fn encode_yes_no(field: FeatureField, value: &str) -> Result<f64, RiskscopeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(1.0),
        "no" | "n" | "false" | "0" => Ok(0.0),
        other => Err(RiskscopeError::InvalidInput(format!(
            "{} must be Yes or No, got `{other}`",
            field.label()
        ))),
    }
}
