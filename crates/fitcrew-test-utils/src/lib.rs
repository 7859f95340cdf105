//! Shared test utilities for fitcrew integration tests.
//!
//! Provides a [`ScriptedModel`] that answers each agent role from its own
//! queue of canned responses, plus fixture documents for every stage of the
//! plan pipeline. No network access is needed.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use fitcrew_core::agents::{CrewConfig, Role, RoleModels};
use fitcrew_core::knowledge::KnowledgeBase;
use fitcrew_core::llm::{ChatModel, ChatRequest, ChatResponse, ModelError, TokenUsage, ToolCall};
use fitcrew_core::schema::{PlanRequest, UserProfile};

// ---------------------------------------------------------------------------
// Scripted model
// ---------------------------------------------------------------------------

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(ChatResponse),
    Fail(ModelError),
}

/// A [`ChatModel`] that replays per-role scripts.
///
/// The role is recognized from the agent's system prompt. When a role's
/// script runs out, the call fails with [`ModelError::InvalidResponse`].
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<Role, VecDeque<Step>>>,
    delays: HashMap<Role, Duration>,
    requests: Mutex<Vec<(Role, ChatRequest)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every role answers its task with a valid fixture document. The
    /// synthesizer validates its draft with the tool before answering.
    pub fn happy_path() -> Self {
        Self::new()
            .text(Role::MetricsAnalyst, metrics_json().to_string())
            .text(Role::WorkoutArchitect, workout_json().to_string())
            .text(Role::NutritionAdvisor, nutrition_json().to_string())
            .tool_call(
                Role::PlanSynthesizer,
                "validate_final_plan",
                json!({ "plan_json": final_plan_json().to_string() }),
            )
            .text(
                Role::PlanSynthesizer,
                format!("Here is the final plan:\n{}", final_plan_json()),
            )
    }

    pub fn step(self, role: Role, step: Step) -> Self {
        self.scripts
            .lock()
            .expect("script lock poisoned")
            .entry(role)
            .or_default()
            .push_back(step);
        self
    }

    pub fn reply(self, role: Role, response: ChatResponse) -> Self {
        self.step(role, Step::Reply(response))
    }

    /// A final text answer with token usage attached.
    pub fn text(self, role: Role, content: impl Into<String>) -> Self {
        let response = ChatResponse {
            usage: Some(TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
            }),
            model: "scripted".to_string(),
            ..ChatResponse::text(content)
        };
        self.reply(role, response)
    }

    /// A turn that asks for `tool` with `arguments`.
    pub fn tool_call(self, role: Role, tool: &str, arguments: Value) -> Self {
        let n = self.pending(role);
        let call = ToolCall {
            id: format!("call_{}_{n}", role.as_str()),
            name: tool.to_string(),
            arguments: arguments.to_string(),
        };
        self.reply(role, ChatResponse::calls(vec![call]))
    }

    pub fn fail(self, role: Role, error: ModelError) -> Self {
        self.step(role, Step::Fail(error))
    }

    /// Sleep before every answer for `role`.
    pub fn delay(mut self, role: Role, delay: Duration) -> Self {
        self.delays.insert(role, delay);
        self
    }

    /// Discard any queued steps for `role`.
    pub fn clear(self, role: Role) -> Self {
        self.scripts
            .lock()
            .expect("script lock poisoned")
            .remove(&role);
        self
    }

    /// Steps still queued for `role`.
    pub fn pending(&self, role: Role) -> usize {
        self.scripts
            .lock()
            .expect("script lock poisoned")
            .get(&role)
            .map_or(0, VecDeque::len)
    }

    /// Requests received from `role`, in order.
    pub fn requests_for(&self, role: Role) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("request lock poisoned")
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, req)| req.clone())
            .collect()
    }

    /// Roles in the order their calls arrived.
    pub fn call_order(&self) -> Vec<Role> {
        self.requests
            .lock()
            .expect("request lock poisoned")
            .iter()
            .map(|(r, _)| *r)
            .collect()
    }
}

/// Recognize the calling role from its persona line.
pub fn role_of(request: &ChatRequest) -> Option<Role> {
    let prompt = request.system_prompt()?;
    Role::ALL
        .into_iter()
        .find(|r| prompt.starts_with(&format!("You are the {}.", r.title())))
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let role = role_of(request)
            .ok_or_else(|| ModelError::InvalidResponse("unrecognized system prompt".into()))?;
        self.requests
            .lock()
            .expect("request lock poisoned")
            .push((role, request.clone()));

        if let Some(delay) = self.delays.get(&role) {
            tokio::time::sleep(*delay).await;
        }

        let step = self
            .scripts
            .lock()
            .expect("script lock poisoned")
            .get_mut(&role)
            .and_then(VecDeque::pop_front);
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(error)) => Err(error),
            None => Err(ModelError::InvalidResponse(format!(
                "script exhausted for {}",
                role.as_str()
            ))),
        }
    }
}

/// A crew config where every role talks to `model`.
pub fn crew_config(model: Arc<dyn ChatModel>) -> CrewConfig {
    CrewConfig::new(
        RoleModels::uniform(model),
        Arc::new(KnowledgeBase::embedded().expect("embedded knowledge base")),
    )
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Wire form of the reference profile: 28-year-old male, 69 kg, 181 cm.
pub fn sample_request() -> Value {
    json!({
        "age": 28,
        "gender": "male",
        "weight": 69,
        "height": 181,
        "fitness_goal": "calisthenic strength",
        "days_per_week": 3,
        "injuries": "none"
    })
}

pub fn sample_profile() -> UserProfile {
    PlanRequest(sample_request())
        .into_profile()
        .expect("sample profile is valid")
}

pub fn metrics_json() -> Value {
    json!({
        "bmi": 21.1,
        "body_fat_percentage": 13.8,
        "body_type": "Ectomorph"
    })
}

fn exercise(name: &str, sets: u32, reps: &str, rest: u32, equipment: &str) -> Value {
    json!({
        "name": name,
        "sets": sets,
        "reps": reps,
        "rest_seconds": rest,
        "equipment": equipment
    })
}

/// Three training days with mixed equipment and a 7-day schedule.
pub fn workout_json() -> Value {
    json!({
        "weekly_schedule": [
            { "day": 1, "activity": "Upper Push" },
            { "day": 2, "activity": "Rest" },
            { "day": 3, "activity": "Upper Pull" },
            { "day": 4, "activity": "Rest" },
            { "day": 5, "activity": "Legs and Core" },
            { "day": 6, "activity": "Active Rest" },
            { "day": 7, "activity": "Rest" }
        ],
        "workouts": {
            "Upper Push": {
                "warm_up": "5 minutes jump rope, arm circles",
                "exercises": [
                    exercise("Push-up", 4, "8-12", 90, "Bodyweight"),
                    exercise("Dumbbell Bench Press", 3, "8-10", 120, "Dumbbells"),
                    exercise("Machine Shoulder Press", 3, "10-12", 90, "Shoulder press machine")
                ],
                "cool_down": "Chest and shoulder stretches"
            },
            "Upper Pull": {
                "warm_up": "Band pull-aparts, scapular hangs",
                "exercises": [
                    exercise("Pull-up", 4, "5-8", 120, "Pull-up bar"),
                    exercise("Seated Cable Row", 3, "10-12", 90, "Cable machine"),
                    exercise("Barbell Curl", 3, "8-10", 60, "Barbell")
                ],
                "cool_down": "Lat and biceps stretches"
            },
            "Legs and Core": {
                "warm_up": "Bodyweight squats, leg swings",
                "exercises": [
                    exercise("Goblet Squat", 4, "10", 90, "Kettlebell"),
                    exercise("Leg Press", 3, "12", 120, "Leg press machine"),
                    {
                        "name": "Plank",
                        "sets": 3,
                        "reps": "hold",
                        "rest_seconds": 60,
                        "duration_seconds": 45,
                        "equipment": "Bodyweight"
                    }
                ],
                "cool_down": "Hamstring and hip flexor stretches"
            }
        },
        "progressive_overload_notes": "Add one rep per set each week; add load once the top of the range is reached."
    })
}

pub fn nutrition_json() -> Value {
    json!({
        "general_principles": "Eat in a small caloric surplus built on whole foods.",
        "macronutrient_focus": "1.6-2.2 g protein per kg of body weight, carbohydrates around training.",
        "hydration": "At least 2.5 litres of water per day, more on training days.",
        "meal_timing_suggestion": "A protein-rich meal within two hours after training."
    })
}

/// A complete, valid final plan assembled from the stage fixtures.
pub fn final_plan_json() -> Value {
    json!({
        "user_summary": { "fitness_goal": "calisthenic strength", "days_per_week": 3 },
        "body_analysis": metrics_json(),
        "workout_plan": workout_json(),
        "nutrition_guidelines": nutrition_json(),
        "status": "pending_review",
        "coach_notes": ""
    })
}
