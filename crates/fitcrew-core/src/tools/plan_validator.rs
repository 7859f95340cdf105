//! Final-plan validator exposed to the synthesis agent.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, string_arg};
use crate::llm::ToolSpec;
use crate::schema::{FinalPlan, SchemaError, Shape};

pub const TOOL_NAME: &str = "validate_final_plan";
const ARG: &str = "plan_json";

pub const SUCCESS_MESSAGE: &str = "Validation successful. The JSON matches the FinalPlan schema.";

/// Outcome of checking a candidate final plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanCheck {
    Valid(Box<FinalPlan>),
    /// The text is not JSON. Carries the parser diagnostic.
    Syntax(String),
    Schema(SchemaError),
}

impl PlanCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Text reply handed back to the model.
    pub fn message(&self) -> String {
        match self {
            Self::Valid(_) => SUCCESS_MESSAGE.to_string(),
            Self::Syntax(e) => format!("Invalid JSON format: {e}. Please fix the JSON syntax."),
            Self::Schema(e) => format!(
                "JSON does not match the required schema: {e}\nPlease fix the data structure and values, then validate again."
            ),
        }
    }
}

/// Parse `json` and check it against the [`FinalPlan`] shape.
///
/// Uses the same gate as the pipeline's final validation.
pub fn check_final_plan(json: &str) -> PlanCheck {
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => return PlanCheck::Syntax(e.to_string()),
    };
    match FinalPlan::from_value(&value) {
        Ok(plan) => PlanCheck::Valid(Box::new(plan)),
        Err(e) => PlanCheck::Schema(e),
    }
}

/// [`check_final_plan`] as a [`Tool`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanValidatorTool;

#[async_trait]
impl Tool for PlanValidatorTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Validates a JSON string against the FinalPlan schema. Use it on the \
                          complete final JSON before finishing. Returns a success message, or a \
                          description of every problem so you can fix the JSON and try again."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    ARG: {
                        "type": "string",
                        "description": "The complete FinalPlan JSON document as a string."
                    }
                },
                "required": [ARG]
            }),
        }
    }

    async fn call(&self, args: &Value) -> String {
        let Some(plan_json) = string_arg(args, ARG) else {
            return format!(
                "Missing '{ARG}' argument. Pass the complete FinalPlan JSON as a string."
            );
        };
        let check = check_final_plan(&plan_json);
        tracing::debug!(valid = check.is_valid(), "plan validator invoked");
        check.message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_plan() -> Value {
        let days: Vec<Value> = (1..=7)
            .map(|d| {
                let activity = if d == 1 { "Full Body" } else { "Rest" };
                json!({"day": d, "activity": activity})
            })
            .collect();
        json!({
            "user_summary": {"fitness_goal": "strength", "days_per_week": 1},
            "body_analysis": {"bmi": 22.0, "body_fat_percentage": 15.0, "body_type": "Mesomorph"},
            "workout_plan": {
                "weekly_schedule": days,
                "workouts": {
                    "Full Body": {
                        "warm_up": "Jog",
                        "exercises": [{
                            "name": "Squat", "sets": 3, "reps": "5",
                            "rest_seconds": 120, "equipment": "Barbell"
                        }],
                        "cool_down": "Walk"
                    }
                },
                "progressive_overload_notes": "Add weight."
            },
            "nutrition_guidelines": {
                "general_principles": "Eat well",
                "macronutrient_focus": "Protein",
                "hydration": "Water",
                "meal_timing_suggestion": "Post workout meal"
            }
        })
    }

    #[test]
    fn syntax_error_message_invites_fix() {
        let check = check_final_plan("{\"user_summary\": ");
        assert!(matches!(check, PlanCheck::Syntax(_)));
        let msg = check.message();
        assert!(msg.starts_with("Invalid JSON format"));
        assert!(msg.contains("Please fix the JSON syntax"));
    }

    #[test]
    fn missing_section_is_named() {
        let mut plan = valid_plan();
        plan.as_object_mut().unwrap().remove("nutrition_guidelines");
        let check = check_final_plan(&plan.to_string());
        assert!(matches!(&check, PlanCheck::Schema(e) if e.mentions("nutrition_guidelines")));
        assert!(check.message().contains("nutrition_guidelines: field required"));
    }

    #[test]
    fn plan_built_from_parts_validates() {
        use crate::schema::{
            MetricsAnalysis, NutritionAdvice, PENDING_REVIEW, PlanRequest, WorkoutPlan,
        };

        let parts = valid_plan();
        let profile = PlanRequest(json!({
            "age": 28,
            "gender": "male",
            "weight": 69,
            "height": 181,
            "fitness_goal": "strength",
            "days_per_week": 1,
            "injuries": "none"
        }))
        .into_profile()
        .unwrap();

        let plan = FinalPlan::new(
            profile.summary(),
            MetricsAnalysis::from_value(&parts["body_analysis"]).unwrap(),
            WorkoutPlan::from_value(&parts["workout_plan"]).unwrap(),
            NutritionAdvice::from_value(&parts["nutrition_guidelines"]).unwrap(),
        );
        assert_eq!(plan.status, PENDING_REVIEW);
        assert!(plan.coach_notes.is_empty());

        let text = serde_json::to_string(&plan).unwrap();
        let check = check_final_plan(&text);
        assert!(check.is_valid(), "{}", check.message());
        assert!(matches!(check, PlanCheck::Valid(parsed) if *parsed == plan));
    }

    #[test]
    fn conforming_plan_succeeds() {
        let check = check_final_plan(&valid_plan().to_string());
        assert!(check.is_valid());
        assert_eq!(check.message(), SUCCESS_MESSAGE);
    }

    #[test]
    fn serialized_plan_validates() {
        let PlanCheck::Valid(plan) = check_final_plan(&valid_plan().to_string()) else {
            panic!("fixture should be valid");
        };
        let json = serde_json::to_string(&plan).unwrap();
        assert!(check_final_plan(&json).is_valid());
    }

    #[tokio::test]
    async fn tool_never_fails_on_bad_arguments() {
        let tool = PlanValidatorTool;
        let out = tool.call(&json!({})).await;
        assert!(out.contains("Missing 'plan_json'"));
        let out = tool.call(&json!({"plan_json": "not json"})).await;
        assert!(out.starts_with("Invalid JSON format"));
    }

    #[tokio::test]
    async fn tool_accepts_inline_object() {
        let out = PlanValidatorTool.call(&json!({"plan_json": valid_plan()})).await;
        assert_eq!(out, SUCCESS_MESSAGE);
    }

    #[test]
    fn spec_declares_required_argument() {
        let spec = PlanValidatorTool.spec();
        assert_eq!(spec.name, TOOL_NAME);
        assert_eq!(spec.parameters["required"][0], ARG);
    }
}
