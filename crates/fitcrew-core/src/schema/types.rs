//! Structured result shapes produced by the pipeline stages.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::shape::{Fields, Shape};
use super::violation::{FieldPath, Violation, ViolationKind};

/// Status given to a freshly generated plan before a coach reviews it.
pub const PENDING_REVIEW: &str = "pending_review";

/// Equipment sentinel for movements that need none.
pub const BODYWEIGHT: &str = "Bodyweight";

/// Somatotypes the metrics analyst is expected to choose from.
pub const SOMATOTYPES: [&str; 3] = ["ectomorph", "mesomorph", "endomorph"];

/// Stage 1 output: body composition analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsAnalysis {
    pub bmi: f64,
    pub body_fat_percentage: f64,
    /// Somatotype, or a blend such as "ecto-mesomorph".
    pub body_type: String,
}

impl MetricsAnalysis {
    /// Whether `body_type` names at least one known somatotype.
    pub fn has_known_body_type(&self) -> bool {
        let lower = self.body_type.to_lowercase();
        SOMATOTYPES
            .iter()
            .any(|s| lower.contains(s) || lower.contains(&s[..4]))
    }
}

impl Shape for MetricsAnalysis {
    const NAME: &'static str = "MetricsAnalysis";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let bmi = f.number_in("bmi", 0.0, 200.0, errs);
        let body_fat_percentage = f.number_in("body_fat_percentage", 0.0, 100.0, errs);
        let body_type = f.non_empty_text("body_type", errs);
        Some(Self {
            bmi: bmi?,
            body_fat_percentage: body_fat_percentage?,
            body_type: body_type?,
        })
    }
}

/// One movement within a workout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    /// Fixed count ("10") or a range ("8-12").
    pub reps: String,
    pub rest_seconds: u32,
    /// Set for time-based movements such as planks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Always populated; [`BODYWEIGHT`] when nothing is needed.
    pub equipment: String,
}

impl Shape for Exercise {
    const NAME: &'static str = "Exercise";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let name = f.non_empty_text("name", errs);
        let sets = f.integer_in("sets", 1, 100, errs);
        let reps = f.non_empty_text("reps", errs);
        let rest_seconds = f.integer_in("rest_seconds", 0, 3600, errs);
        let duration_seconds = f.optional_integer_in("duration_seconds", 0, 86_400, errs);
        let equipment = f.non_empty_text("equipment", errs);
        Some(Self {
            name: name?,
            sets: sets?,
            reps: reps?,
            rest_seconds: rest_seconds?,
            duration_seconds: duration_seconds?,
            equipment: equipment?,
        })
    }
}

/// A single named workout session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutDetail {
    pub warm_up: String,
    pub exercises: Vec<Exercise>,
    pub cool_down: String,
}

impl Shape for WorkoutDetail {
    const NAME: &'static str = "WorkoutDetail";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let warm_up = f.text("warm_up", errs);
        let exercises = f.list("exercises", true, errs);
        let cool_down = f.text("cool_down", errs);
        Some(Self {
            warm_up: warm_up?,
            exercises: exercises?,
            cool_down: cool_down?,
        })
    }
}

/// What happens on one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyScheduleItem {
    /// Day number, 1 through 7.
    pub day: u8,
    /// A key of [`WorkoutPlan::workouts`] or a rest marker.
    pub activity: String,
}

impl Shape for WeeklyScheduleItem {
    const NAME: &'static str = "WeeklyScheduleItem";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let day = f.integer_in("day", 1, 7, errs);
        let activity = f.non_empty_text("activity", errs);
        Some(Self {
            day: day?,
            activity: activity?,
        })
    }
}

/// Stage 2 output: the week-long training plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutPlan {
    pub weekly_schedule: Vec<WeeklyScheduleItem>,
    pub workouts: BTreeMap<String, WorkoutDetail>,
    pub progressive_overload_notes: String,
}

impl WorkoutPlan {
    /// Every exercise across all workouts.
    pub fn exercises(&self) -> impl Iterator<Item = &Exercise> {
        self.workouts.values().flat_map(|w| w.exercises.iter())
    }

    /// Distinct equipment labels used by the plan, lowercased.
    pub fn equipment_mix(&self) -> BTreeSet<String> {
        self.exercises()
            .map(|e| e.equipment.trim().to_lowercase())
            .collect()
    }

    /// Describe how the schedule departs from one entry per day 1..=7, or
    /// `None` when the week is fully covered.
    pub fn week_coverage_gap(&self) -> Option<String> {
        let days: BTreeSet<u8> = self.weekly_schedule.iter().map(|s| s.day).collect();
        if self.weekly_schedule.len() == 7 && days.len() == 7 {
            return None;
        }
        let missing: Vec<String> = (1..=7u8)
            .filter(|d| !days.contains(d))
            .map(|d| d.to_string())
            .collect();
        let mut detail = format!(
            "expected 7 entries (one per day), found {}",
            self.weekly_schedule.len()
        );
        if !missing.is_empty() {
            detail.push_str(&format!("; missing days {}", missing.join(", ")));
        }
        if days.len() != self.weekly_schedule.len() {
            detail.push_str("; duplicate days present");
        }
        Some(detail)
    }
}

impl Shape for WorkoutPlan {
    const NAME: &'static str = "WorkoutPlan";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let weekly_schedule: Option<Vec<WeeklyScheduleItem>> =
            f.list("weekly_schedule", true, errs);
        let workouts = f.map("workouts", true, errs);
        let progressive_overload_notes = f.text("progressive_overload_notes", errs);

        Some(Self {
            weekly_schedule: weekly_schedule?,
            workouts: workouts?,
            progressive_overload_notes: progressive_overload_notes?,
        })
    }
}

/// Stage 3 output: general nutrition guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutritionAdvice {
    pub general_principles: String,
    pub macronutrient_focus: String,
    pub hydration: String,
    pub meal_timing_suggestion: String,
}

impl Shape for NutritionAdvice {
    const NAME: &'static str = "NutritionAdvice";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let general_principles = f.non_empty_text("general_principles", errs);
        let macronutrient_focus = f.non_empty_text("macronutrient_focus", errs);
        let hydration = f.non_empty_text("hydration", errs);
        let meal_timing_suggestion = f.non_empty_text("meal_timing_suggestion", errs);
        Some(Self {
            general_principles: general_principles?,
            macronutrient_focus: macronutrient_focus?,
            hydration: hydration?,
            meal_timing_suggestion: meal_timing_suggestion?,
        })
    }
}

/// Projection of the profile carried into the final plan for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub fitness_goal: String,
    pub days_per_week: u8,
}

impl Shape for UserSummary {
    const NAME: &'static str = "UserSummary";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let fitness_goal = f.non_empty_text("fitness_goal", errs);
        let days_per_week = f.integer_in("days_per_week", 1, 7, errs);
        Some(Self {
            fitness_goal: fitness_goal?,
            days_per_week: days_per_week?,
        })
    }
}

/// The terminal artifact of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalPlan {
    pub user_summary: UserSummary,
    pub body_analysis: MetricsAnalysis,
    pub workout_plan: WorkoutPlan,
    pub nutrition_guidelines: NutritionAdvice,
    pub status: String,
    pub coach_notes: String,
}

impl FinalPlan {
    /// Assemble a plan from its parts with the default review status.
    pub fn new(
        user_summary: UserSummary,
        body_analysis: MetricsAnalysis,
        workout_plan: WorkoutPlan,
        nutrition_guidelines: NutritionAdvice,
    ) -> Self {
        Self {
            user_summary,
            body_analysis,
            workout_plan,
            nutrition_guidelines,
            status: PENDING_REVIEW.to_string(),
            coach_notes: String::new(),
        }
    }
}

impl Shape for FinalPlan {
    const NAME: &'static str = "FinalPlan";

    fn read(value: &Value, path: &FieldPath, errs: &mut Vec<Violation>) -> Option<Self> {
        let f = Fields::open(value, path, errs)?;
        let user_summary = f.nested("user_summary", errs);
        let body_analysis = f.nested("body_analysis", errs);
        let workout_plan = f.nested("workout_plan", errs);
        let nutrition_guidelines = f.nested("nutrition_guidelines", errs);
        let status = f.text_or("status", PENDING_REVIEW, errs);
        let coach_notes = f.text_or("coach_notes", "", errs);
        Some(Self {
            user_summary: user_summary?,
            body_analysis: body_analysis?,
            workout_plan: workout_plan?,
            nutrition_guidelines: nutrition_guidelines?,
            status: status?,
            coach_notes: coach_notes?,
        })
    }
}
