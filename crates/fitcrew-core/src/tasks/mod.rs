//! The four task nodes and the coercion of their raw output.
//!
//! The first three nodes must produce a value of their declared shape or the
//! task fails outright. The synthesis node's raw text is passed through; its
//! self-correction happens inside the agent via the plan validator.

pub mod prompts;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::agents::{AgentError, Role};
use crate::extract::extract_json_object;
use crate::schema::{MetricsAnalysis, NutritionAdvice, Shape, WorkoutPlan};

pub use prompts::{
    build_tasks, metrics_analysis_task, nutrition_advice_task, render_prompt, synthesis_task,
    workout_draft_task,
};

/// Identity of a node in the task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MetricsAnalysis,
    WorkoutDraft,
    NutritionAdvice,
    Synthesis,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::MetricsAnalysis,
        TaskKind::WorkoutDraft,
        TaskKind::NutritionAdvice,
        TaskKind::Synthesis,
    ];

    /// Stable node name.
    pub fn name(self) -> &'static str {
        match self {
            Self::MetricsAnalysis => "metrics_analysis",
            Self::WorkoutDraft => "workout_draft",
            Self::NutritionAdvice => "nutrition_advice",
            Self::Synthesis => "synthesis",
        }
    }

    /// Heading used when this node's result is passed downstream.
    pub fn label(self) -> &'static str {
        match self {
            Self::MetricsAnalysis => "Body Analysis",
            Self::WorkoutDraft => "Workout Plan",
            Self::NutritionAdvice => "Nutrition Guidelines",
            Self::Synthesis => "Final Plan",
        }
    }

    /// The role that runs this node.
    pub fn role(self) -> Role {
        match self {
            Self::MetricsAnalysis => Role::MetricsAnalyst,
            Self::WorkoutDraft => Role::WorkoutArchitect,
            Self::NutritionAdvice => Role::NutritionAdvisor,
            Self::Synthesis => Role::PlanSynthesizer,
        }
    }

    /// Nodes whose results this node reads.
    pub fn dependencies(self) -> &'static [TaskKind] {
        match self {
            Self::MetricsAnalysis => &[],
            Self::WorkoutDraft | Self::NutritionAdvice => &[Self::MetricsAnalysis],
            Self::Synthesis => &[Self::MetricsAnalysis, Self::WorkoutDraft, Self::NutritionAdvice],
        }
    }

    /// Declared output shape name.
    pub fn output_shape(self) -> &'static str {
        match self {
            Self::MetricsAnalysis => MetricsAnalysis::NAME,
            Self::WorkoutDraft => WorkoutPlan::NAME,
            Self::NutritionAdvice => NutritionAdvice::NAME,
            Self::Synthesis => "FinalPlan JSON text",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One task node as built for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    /// Instructions parameterized by the user's data.
    pub description: String,
    /// The output contract appended to the prompt.
    pub expected_output: String,
}

/// Failures of a single task node.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("output is not a valid {shape}: {detail}")]
    OutputParse { shape: &'static str, detail: String },
}

/// Coerced result of a task node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Metrics(MetricsAnalysis),
    Workout(WorkoutPlan),
    Nutrition(NutritionAdvice),
    /// Raw synthesis text, extracted and validated by the pipeline.
    Synthesis(String),
}

impl TaskOutput {
    /// Text handed to downstream nodes as context.
    pub fn context_text(&self) -> String {
        match self {
            Self::Metrics(m) => serde_json::to_string_pretty(m).unwrap_or_default(),
            Self::Workout(w) => serde_json::to_string_pretty(w).unwrap_or_default(),
            Self::Nutrition(n) => serde_json::to_string_pretty(n).unwrap_or_default(),
            Self::Synthesis(raw) => raw.clone(),
        }
    }
}

/// Force raw model text into shape `T`: extract, parse, validate.
pub fn coerce<T: Shape>(raw: &str) -> Result<T, TaskError> {
    let json = extract_json_object(raw).ok_or_else(|| TaskError::OutputParse {
        shape: T::NAME,
        detail: "no JSON object found in output".to_string(),
    })?;
    T::from_json_str(json).map_err(|e| TaskError::OutputParse {
        shape: T::NAME,
        detail: e.to_string(),
    })
}

/// Coerce the raw output of `kind` into its declared result.
pub fn coerce_output(kind: TaskKind, raw: String) -> Result<TaskOutput, TaskError> {
    match kind {
        TaskKind::MetricsAnalysis => {
            let metrics: MetricsAnalysis = coerce(&raw)?;
            if !metrics.has_known_body_type() {
                tracing::warn!(
                    body_type = %metrics.body_type,
                    "body type is not a recognized somatotype"
                );
            }
            Ok(TaskOutput::Metrics(metrics))
        }
        TaskKind::WorkoutDraft => {
            let plan: WorkoutPlan = coerce(&raw)?;
            audit_workout(&plan);
            Ok(TaskOutput::Workout(plan))
        }
        TaskKind::NutritionAdvice => Ok(TaskOutput::Nutrition(coerce(&raw)?)),
        TaskKind::Synthesis => Ok(TaskOutput::Synthesis(raw)),
    }
}

/// Log instructions the model ignored that the schema cannot express.
fn audit_workout(plan: &WorkoutPlan) {
    if let Some(gap) = plan.week_coverage_gap() {
        tracing::warn!(detail = %gap, "weekly schedule does not cover each day once");
    }
    let mix = plan.equipment_mix();
    if mix.len() < 2 {
        tracing::warn!(
            equipment = ?mix,
            "workout plan uses a single equipment modality"
        );
    }
    for item in &plan.weekly_schedule {
        let is_rest = item.activity.to_lowercase().contains("rest");
        if !is_rest && !plan.workouts.contains_key(&item.activity) {
            tracing::warn!(
                day = item.day,
                activity = %item.activity,
                "schedule entry does not name a defined workout"
            );
        }
    }
}
