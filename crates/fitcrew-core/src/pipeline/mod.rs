//! Entry point: one profile in, one validated [`FinalPlan`] out.
//!
//! Every failure is tagged with the stage that produced it so callers can
//! tell a client error from an upstream outage. No partial plan is returned.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agents::{AgentError, Crew, CrewConfig};
use crate::extract::{extract_json_object, preview};
use crate::llm::ModelError;
use crate::orchestrator::{GraphError, OrchestrationError, Orchestrator, OrchestratorConfig};
use crate::schema::{FinalPlan, SchemaError, Shape, UserProfile};
use crate::tasks::{TaskError, TaskKind};

/// Wall-clock limit for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

/// Failure category, stable across error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Orchestration,
    Extraction,
    MalformedJson,
    SchemaViolation,
    UpstreamUnavailable,
    Timeout,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orchestration => "orchestration_failure",
            Self::Extraction => "extraction_failure",
            Self::MalformedJson => "malformed_json",
            Self::SchemaViolation => "schema_violation",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an invocation stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Elapsed(Duration),
    Cancelled,
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elapsed(after) => write!(f, "plan generation timed out after {}s", after.as_secs()),
            Self::Cancelled => f.write_str("plan generation was cancelled"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("orchestration failure: {0}")]
    Orchestration(#[source] OrchestrationError),

    #[error("extraction failure: no JSON object found in model output")]
    Extraction { preview: String },

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("schema violation: {0}")]
    SchemaViolation(#[source] SchemaError),

    #[error("model service failed during {task}: {source}")]
    UpstreamUnavailable {
        task: TaskKind,
        #[source]
        source: ModelError,
    },

    #[error("{0}")]
    Timeout(Deadline),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Orchestration(_) => FailureKind::Orchestration,
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::MalformedJson(_) => FailureKind::MalformedJson,
            Self::SchemaViolation(_) => FailureKind::SchemaViolation,
            Self::UpstreamUnavailable { .. } => FailureKind::UpstreamUnavailable,
            Self::Timeout(_) => FailureKind::Timeout,
        }
    }

    /// Whether the same request may succeed if tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::UpstreamUnavailable | FailureKind::Timeout
        )
    }

    /// The model-service error behind an upstream failure.
    pub fn upstream(&self) -> Option<&ModelError> {
        match self {
            Self::UpstreamUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<OrchestrationError> for PipelineError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Cancelled => Self::Timeout(Deadline::Cancelled),
            OrchestrationError::Task {
                task,
                source: TaskError::Agent(AgentError::Model(source)),
            } => Self::UpstreamUnavailable { task, source },
            other => Self::Orchestration(other),
        }
    }
}

/// Turn the synthesis node's raw text into a validated plan.
pub fn finalize(raw: &str) -> Result<FinalPlan, PipelineError> {
    let json = extract_json_object(raw).ok_or_else(|| PipelineError::Extraction {
        preview: preview(raw),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| PipelineError::MalformedJson(e.to_string()))?;
    FinalPlan::from_value(&value).map_err(PipelineError::SchemaViolation)
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub crew: CrewConfig,
    pub orchestrator: OrchestratorConfig,
    pub timeout: Duration,
}

impl PipelineConfig {
    pub fn new(crew: CrewConfig) -> Self {
        Self {
            crew,
            orchestrator: OrchestratorConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Shared, immutable pipeline. Each call builds its own agents.
#[derive(Debug, Clone)]
pub struct Pipeline {
    crew: CrewConfig,
    orchestrator: Orchestrator,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, GraphError> {
        Ok(Self {
            crew: config.crew,
            orchestrator: Orchestrator::new(config.orchestrator)?,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the full graph for `profile` and return the validated plan.
    pub async fn generate_plan(
        &self,
        profile: &UserProfile,
        cancel: CancellationToken,
    ) -> Result<FinalPlan, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("generate_plan", %run_id);
        self.generate_inner(profile, cancel).instrument(span).await
    }

    async fn generate_inner(
        &self,
        profile: &UserProfile,
        cancel: CancellationToken,
    ) -> Result<FinalPlan, PipelineError> {
        tracing::info!(
            goal = %profile.fitness_goal,
            days_per_week = profile.days_per_week,
            injuries = profile.has_injuries(),
            "starting plan generation"
        );
        let crew = Crew::assemble(&self.crew);
        let run = self.orchestrator.run(crew, profile, cancel.child_token());

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result.map_err(PipelineError::from).inspect_err(|e| {
                tracing::warn!(kind = %e.kind(), error = %e, "plan generation failed");
            })?,
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "plan generation timed out");
                return Err(PipelineError::Timeout(Deadline::Elapsed(self.timeout)));
            }
        };

        let plan = finalize(&output.raw).inspect_err(|e| {
            tracing::warn!(kind = %e.kind(), error = %e, "final plan rejected");
        })?;
        let usage = output.usage();
        tracing::info!(
            workouts = plan.workout_plan.workouts.len(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "plan generated"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_without_braces_is_extraction() {
        let err = finalize("I could not build a plan today.").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert!(err.to_string().contains("no JSON object found in model output"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn finalize_reports_parser_message() {
        let err = finalize("{\"user_summary\": }").unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedJson);
        assert!(err.to_string().starts_with("malformed JSON: "));
    }

    #[test]
    fn finalize_lists_missing_sections() {
        let err = finalize("{\"user_summary\": {\"fitness_goal\": \"x\", \"days_per_week\": 3}}")
            .unwrap_err();
        let PipelineError::SchemaViolation(schema) = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(schema.mentions("body_analysis"));
        assert!(schema.mentions("workout_plan"));
        assert!(schema.mentions("nutrition_guidelines"));
    }

    #[test]
    fn model_failure_inside_a_node_is_upstream() {
        let err = PipelineError::from(OrchestrationError::Task {
            task: TaskKind::WorkoutDraft,
            source: TaskError::Agent(AgentError::Model(ModelError::RateLimited(
                "slow down".into(),
            ))),
        });
        assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);
        assert!(err.is_retryable());
        assert!(err.upstream().is_some_and(ModelError::is_unavailable));
    }

    #[test]
    fn output_parse_failure_is_orchestration() {
        let err = PipelineError::from(OrchestrationError::Task {
            task: TaskKind::MetricsAnalysis,
            source: TaskError::OutputParse {
                shape: "MetricsAnalysis",
                detail: "no JSON object found in output".into(),
            },
        });
        assert_eq!(err.kind(), FailureKind::Orchestration);
        assert!(err.upstream().is_none());
    }

    #[test]
    fn cancellation_is_timeout() {
        let err = PipelineError::from(OrchestrationError::Cancelled);
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.to_string(), "plan generation was cancelled");
        let elapsed = PipelineError::Timeout(Deadline::Elapsed(Duration::from_secs(240)));
        assert!(elapsed.to_string().contains("240s"));
    }
}
