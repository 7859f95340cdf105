//! The user profile a plan is generated for, and the request it is read from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::shape::{Fields, Shape};
use super::types::UserSummary;
use super::violation::{FieldPath, SchemaError, Violation};

/// Sentinel stored when the user reports no injuries.
pub const NO_INJURIES: &str = "none";

/// Validated biometrics and goals for one plan request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub age: u32,
    pub gender: String,
    pub weight_kg: f64,
    pub height_cm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neck_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waist_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hip_cm: Option<f64>,
    pub fitness_goal: String,
    pub days_per_week: u8,
    pub injuries: String,
}

impl UserProfile {
    /// The part of the profile carried into the final plan.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            fitness_goal: self.fitness_goal.clone(),
            days_per_week: self.days_per_week,
        }
    }

    /// Whether the user reported any injury worth planning around.
    pub fn has_injuries(&self) -> bool {
        !self.injuries.trim().eq_ignore_ascii_case(NO_INJURIES)
    }
}

/// Reads the wire format of a plan request (`weight`, `height`, `neck`, ...).
impl Shape for UserProfile {
    const NAME: &'static str = "PlanRequest";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let age = f.integer_in("age", 1, 130, errs);
        let gender = f.non_empty_text("gender", errs);
        let weight_kg = f.number_in("weight", 0.0, 500.0, errs);
        let height_cm = f.number_in("height", 0.0, 300.0, errs);
        let neck_cm = f.optional_number_in("neck", 0.0, 200.0, errs);
        let waist_cm = f.optional_number_in("waist", 0.0, 300.0, errs);
        let hip_cm = f.optional_number_in("hip", 0.0, 300.0, errs);
        let fitness_goal = f.non_empty_text("fitness_goal", errs);
        let days_per_week = f.integer_in("days_per_week", 1, 7, errs);
        let injuries = f.text("injuries", errs).map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                NO_INJURIES.to_string()
            } else {
                trimmed.to_string()
            }
        });
        Some(Self {
            age: age?,
            gender: gender?.trim().to_string(),
            weight_kg: weight_kg?,
            height_cm: height_cm?,
            neck_cm: neck_cm?,
            waist_cm: waist_cm?,
            hip_cm: hip_cm?,
            fitness_goal: fitness_goal?.trim().to_string(),
            days_per_week: days_per_week?,
            injuries: injuries?,
        })
    }
}

/// Untyped plan request body as received on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PlanRequest(pub Value);

impl PlanRequest {
    /// Validate the request, reporting every bad field at once.
    pub fn into_profile(self) -> Result<UserProfile, SchemaError> {
        UserProfile::from_value(&self.0)
    }
}
