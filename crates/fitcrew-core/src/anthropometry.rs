//! Reference body-composition calculations.
//!
//! These figures are handed to the metrics analyst as grounding so that an
//! estimate is always available, even when tape measurements are missing.

use std::fmt;

use serde::Serialize;

use crate::schema::UserProfile;

/// Biological sex as used by the body-fat equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Unspecified,
}

impl Sex {
    /// Interpret a free-text gender field.
    pub fn parse(gender: &str) -> Self {
        match gender.trim().to_lowercase().as_str() {
            "male" | "m" | "man" => Self::Male,
            "female" | "f" | "woman" => Self::Female,
            _ => Self::Unspecified,
        }
    }

    /// Coefficient used by the BMI-based equation (1 male, 0 female).
    fn bmi_coefficient(self) -> f64 {
        match self {
            Self::Male => 1.0,
            Self::Female => 0.0,
            Self::Unspecified => 0.5,
        }
    }
}

/// WHO adult BMI category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 25.0 {
            Self::Normal
        } else if bmi < 30.0 {
            Self::Overweight
        } else {
            Self::Obese
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Underweight => "underweight",
            Self::Normal => "normal",
            Self::Overweight => "overweight",
            Self::Obese => "obese",
        };
        f.write_str(s)
    }
}

/// How a body-fat figure was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyFatMethod {
    /// US Navy circumference method.
    Navy,
    /// Deurenberg BMI/age/sex regression.
    BmiRegression,
}

impl fmt::Display for BodyFatMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navy => f.write_str("US Navy circumference method"),
            Self::BmiRegression => f.write_str("BMI-based regression"),
        }
    }
}

/// Reference figures computed from a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceMetrics {
    pub bmi: f64,
    pub bmi_category: BmiCategory,
    pub body_fat_percentage: f64,
    pub body_fat_method: BodyFatMethod,
}

/// Body mass index from kilograms and centimetres.
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let m = height_cm / 100.0;
    weight_kg / (m * m)
}

/// US Navy body-fat estimate from centimetre measurements.
///
/// Returns `None` when a required measurement is missing, the sex is
/// unspecified, or the measurements give a non-positive log argument.
pub fn navy_body_fat(
    sex: Sex,
    height_cm: f64,
    neck_cm: Option<f64>,
    waist_cm: Option<f64>,
    hip_cm: Option<f64>,
) -> Option<f64> {
    let neck = neck_cm?;
    let waist = waist_cm?;
    let density = match sex {
        Sex::Male => {
            let girth = waist - neck;
            if girth <= 0.0 {
                return None;
            }
            1.0324 - 0.19077 * girth.log10() + 0.15456 * height_cm.log10()
        }
        Sex::Female => {
            let girth = waist + hip_cm? - neck;
            if girth <= 0.0 {
                return None;
            }
            1.29579 - 0.35004 * girth.log10() + 0.22100 * height_cm.log10()
        }
        Sex::Unspecified => return None,
    };
    let pct = 495.0 / density - 450.0;
    (pct > 0.0 && pct < 100.0).then_some(pct)
}

/// Deurenberg estimate from BMI, age and sex.
pub fn bmi_body_fat(bmi: f64, age: u32, sex: Sex) -> f64 {
    let pct = 1.20 * bmi + 0.23 * f64::from(age) - 10.8 * sex.bmi_coefficient() - 5.4;
    pct.clamp(2.0, 75.0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Compute reference metrics, preferring the circumference method.
pub fn reference_metrics(profile: &UserProfile) -> ReferenceMetrics {
    let sex = Sex::parse(&profile.gender);
    let bmi = bmi(profile.weight_kg, profile.height_cm);
    let (body_fat, method) = match navy_body_fat(
        sex,
        profile.height_cm,
        profile.neck_cm,
        profile.waist_cm,
        profile.hip_cm,
    ) {
        Some(pct) => (pct, BodyFatMethod::Navy),
        None => (bmi_body_fat(bmi, profile.age, sex), BodyFatMethod::BmiRegression),
    };
    ReferenceMetrics {
        bmi: round1(bmi),
        bmi_category: BmiCategory::from_bmi(bmi),
        body_fat_percentage: round1(body_fat),
        body_fat_method: method,
    }
}
