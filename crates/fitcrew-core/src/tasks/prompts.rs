//! Task descriptions, expected-output contracts and prompt rendering.

use serde_json::json;

use super::{TaskKind, TaskSpec};
use crate::anthropometry::ReferenceMetrics;
use crate::schema::UserProfile;
use crate::tools::plan_validator::TOOL_NAME as VALIDATOR_TOOL;

// ---------------------------------------------------------------------------
// Schema references
// ---------------------------------------------------------------------------

const METRICS_SCHEMA: &str = r#"```json
{
  "bmi": 0.0,                  // REQUIRED. number > 0
  "body_fat_percentage": 0.0,  // REQUIRED. number in (0, 100]
  "body_type": "Mesomorph"     // REQUIRED. Ectomorph, Mesomorph, Endomorph or a blend
}
```"#;

const WORKOUT_SCHEMA: &str = r#"```json
{
  "weekly_schedule": [              // REQUIRED. exactly 7 entries, days 1..7 once each
    {"day": 1, "activity": "Full Body A"},
    {"day": 2, "activity": "Rest"}
  ],
  "workouts": {                     // REQUIRED. workout name -> detail, non-empty
    "Full Body A": {
      "warm_up": "string",          // REQUIRED
      "exercises": [                // REQUIRED. at least one
        {
          "name": "Goblet Squat",   // REQUIRED
          "sets": 3,                // REQUIRED. integer >= 1
          "reps": "8-12",           // REQUIRED. string, a count or a range
          "rest_seconds": 90,       // REQUIRED. integer
          "duration_seconds": null, // optional integer, for timed holds
          "equipment": "Dumbbell"   // REQUIRED. never empty, "Bodyweight" if none
        }
      ],
      "cool_down": "string"         // REQUIRED
    }
  },
  "progressive_overload_notes": "string"  // REQUIRED
}
```"#;

const NUTRITION_SCHEMA: &str = r#"```json
{
  "general_principles": "string",     // REQUIRED
  "macronutrient_focus": "string",    // REQUIRED
  "hydration": "string",              // REQUIRED
  "meal_timing_suggestion": "string"  // REQUIRED
}
```"#;

const FINAL_PLAN_SCHEMA: &str = r#"```json
{
  "user_summary": {"fitness_goal": "string", "days_per_week": 3},
  "body_analysis": { ...MetricsAnalysis... },
  "workout_plan": { ...WorkoutPlan... },
  "nutrition_guidelines": { ...NutritionAdvice... },
  "status": "pending_review",
  "coach_notes": ""
}
```"#;

const JSON_ONLY: &str = "Respond with the JSON object only: no markdown fences, no commentary.";

// ---------------------------------------------------------------------------
// Task builders
// ---------------------------------------------------------------------------

fn measurement(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v} cm"),
        None => "not provided".to_string(),
    }
}

/// Stage 1: body-composition analysis from raw biometrics.
pub fn metrics_analysis_task(profile: &UserProfile, reference: &ReferenceMetrics) -> TaskSpec {
    let mut d = String::with_capacity(1024);
    d.push_str("Analyze the user's data to determine key fitness metrics.\n");
    d.push_str(
        "If some body measurements are not provided, make your best estimate from the \
         available data (age, gender, height, weight). Every output field must be filled in.\n\n",
    );
    d.push_str("User data:\n");
    d.push_str(&format!("- Age: {}\n", profile.age));
    d.push_str(&format!("- Gender: {}\n", profile.gender));
    d.push_str(&format!("- Height: {} cm\n", profile.height_cm));
    d.push_str(&format!("- Weight: {} kg\n", profile.weight_kg));
    d.push_str(&format!("- Neck: {}\n", measurement(profile.neck_cm)));
    d.push_str(&format!("- Waist: {}\n", measurement(profile.waist_cm)));
    d.push_str(&format!("- Hip: {}\n\n", measurement(profile.hip_cm)));
    d.push_str("Reference values computed from this data:\n");
    d.push_str(&format!(
        "- BMI: {} ({})\n",
        reference.bmi, reference.bmi_category
    ));
    d.push_str(&format!(
        "- Estimated body fat: {}% ({})\n\n",
        reference.body_fat_percentage, reference.body_fat_method
    ));
    d.push_str(
        "Based on this data, calculate or estimate the user's BMI and body fat percentage, \
         and determine their body type (Ectomorph, Mesomorph, Endomorph, or a blend). \
         Use the body-assessment reference table to ground your estimates.",
    );

    TaskSpec {
        kind: TaskKind::MetricsAnalysis,
        description: d,
        expected_output: format!(
            "A JSON object that strictly follows the MetricsAnalysis schema:\n{METRICS_SCHEMA}\n{JSON_ONLY}"
        ),
    }
}

/// Stage 2: the weekly training plan.
pub fn workout_draft_task(profile: &UserProfile) -> TaskSpec {
    let mut d = String::with_capacity(1024);
    d.push_str(
        "Create a detailed 7-day workout plan draft based on the user's goals and the \
         provided body analysis.\n\n",
    );
    d.push_str("Crucial instructions:\n");
    d.push_str(
        "- Incorporate a mix of exercise types: bodyweight, free weights (dumbbells, \
         barbells), and common gym machines (cable machines, leg press, lat pulldown).\n",
    );
    d.push_str(
        "- For EVERY exercise you MUST fill in the 'equipment' field. If no equipment is \
         needed, write 'Bodyweight'.\n",
    );
    d.push_str(&format!(
        "- The weekly schedule has exactly 7 entries, one for each day 1 to 7. Schedule {} \
         training days and mark the others 'Rest'.\n\n",
        profile.days_per_week
    ));
    d.push_str("User goals:\n");
    d.push_str(&format!("- Primary goal: \"{}\"\n", profile.fitness_goal));
    d.push_str(&format!("- Days per week: {}\n", profile.days_per_week));
    d.push_str(&format!("- Injuries: {}\n\n", profile.injuries));
    if profile.has_injuries() {
        d.push_str("Avoid movements that load the injured area and offer safer substitutes.\n");
    }
    d.push_str("Design the weekly schedule for a beginner and give detailed workouts.");

    TaskSpec {
        kind: TaskKind::WorkoutDraft,
        description: d,
        expected_output: format!(
            "A JSON object that strictly follows the WorkoutPlan schema, with the equipment \
             field filled for every exercise:\n{WORKOUT_SCHEMA}\n{JSON_ONLY}"
        ),
    }
}

/// Stage 3: nutrition guidance.
pub fn nutrition_advice_task(profile: &UserProfile) -> TaskSpec {
    let description = format!(
        "Provide foundational nutrition advice tailored to the user's primary goal of \
         \"{}\". Consider the body analysis provided in the context. Keep the advice simple \
         and actionable for a beginner. Give general guidance only, with no medical claims.",
        profile.fitness_goal
    );
    TaskSpec {
        kind: TaskKind::NutritionAdvice,
        description,
        expected_output: format!(
            "A JSON object that strictly follows the NutritionAdvice schema:\n{NUTRITION_SCHEMA}\n{JSON_ONLY}"
        ),
    }
}

/// Stage 4: merge everything into the final plan.
pub fn synthesis_task(profile: &UserProfile) -> TaskSpec {
    let summary = json!({
        "fitness_goal": profile.fitness_goal,
        "days_per_week": profile.days_per_week,
    });

    let mut d = String::with_capacity(2048);
    d.push_str(
        "Act as the final compiler. You receive structured results from three specialists \
         and MUST combine them into a single JSON object that strictly follows the FinalPlan \
         schema.\n\n",
    );
    d.push_str("1. body_analysis: the Body Analysis result from the context, unchanged.\n");
    d.push_str("2. workout_plan: the Workout Plan result from the context, unchanged.\n");
    d.push_str(
        "3. nutrition_guidelines: the Nutrition Guidelines result from the context, unchanged.\n",
    );
    d.push_str(&format!("4. user_summary: exactly {summary}\n"));
    d.push_str("5. status: \"pending_review\". coach_notes: \"\".\n\n");
    d.push_str(&format!(
        "Crucial final step: once the JSON is complete, call the `{VALIDATOR_TOOL}` tool with \
         it. If it reports errors, fix the JSON and validate again until it succeeds.\n\n"
    ));
    d.push_str(
        "Your final answer MUST be ONLY the validated JSON itself. No extra text, no \
         apologies, no \"Here is the JSON:\".",
    );

    TaskSpec {
        kind: TaskKind::Synthesis,
        description: d,
        expected_output: format!(
            "A single raw JSON string that has passed `{VALIDATOR_TOOL}`:\n{FINAL_PLAN_SCHEMA}"
        ),
    }
}

/// All four task specs for one invocation, in graph order.
pub fn build_tasks(profile: &UserProfile, reference: &ReferenceMetrics) -> Vec<TaskSpec> {
    vec![
        metrics_analysis_task(profile, reference),
        workout_draft_task(profile),
        nutrition_advice_task(profile),
        synthesis_task(profile),
    ]
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Full user prompt: description, output contract, then upstream results.
pub fn render_prompt(spec: &TaskSpec, context: &[(TaskKind, &str)]) -> String {
    let mut prompt = String::with_capacity(spec.description.len() + 2048);
    prompt.push_str(&spec.description);
    prompt.push_str("\n\n## Expected output\n\n");
    prompt.push_str(&spec.expected_output);
    prompt.push('\n');

    if !context.is_empty() {
        prompt.push_str("\n## Context from previous tasks\n");
        for (kind, text) in context {
            prompt.push_str(&format!("\n### {} ({})\n\n", kind.label(), kind.name()));
            prompt.push_str(text.trim());
            prompt.push('\n');
        }
    }
    prompt
}
