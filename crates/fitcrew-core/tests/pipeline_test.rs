//! End-to-end tests for plan generation against a scripted model.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use fitcrew_core::agents::{AgentError, Role};
use fitcrew_core::llm::{MessageRole, ModelError};
use fitcrew_core::orchestrator::OrchestrationError;
use fitcrew_core::pipeline::{Deadline, FailureKind, Pipeline, PipelineConfig, PipelineError};
use fitcrew_core::schema::{FinalPlan, PENDING_REVIEW};
use fitcrew_core::tasks::{TaskError, TaskKind};
use fitcrew_core::tools::plan_validator::SUCCESS_MESSAGE;
use fitcrew_test_utils::{
    ScriptedModel, crew_config, final_plan_json, sample_profile, workout_json,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn pipeline(model: &Arc<ScriptedModel>) -> Pipeline {
    Pipeline::new(PipelineConfig::new(crew_config(model.clone()))).expect("standard graph is valid")
}

async fn generate(model: &Arc<ScriptedModel>) -> Result<FinalPlan, PipelineError> {
    pipeline(model)
        .generate_plan(&sample_profile(), CancellationToken::new())
        .await
}

fn synthesizer_answers(text: impl Into<String>) -> ScriptedModel {
    ScriptedModel::happy_path()
        .clear(Role::PlanSynthesizer)
        .text(Role::PlanSynthesizer, text)
}

// ===========================================================================
// Success
// ===========================================================================

#[tokio::test]
async fn generates_plan_for_reference_profile() {
    let model = Arc::new(ScriptedModel::happy_path());
    let plan = generate(&model).await.expect("plan generation succeeds");

    assert_eq!(plan.status, PENDING_REVIEW);
    assert_eq!(plan.coach_notes, "");
    assert_eq!(plan.workout_plan.weekly_schedule.len(), 7);
    assert_eq!(plan.user_summary.days_per_week, 3);
    assert_eq!(plan.body_analysis.body_type, "Ectomorph");
    assert_eq!(model.pending(Role::PlanSynthesizer), 0);
}

#[tokio::test]
async fn synthesizer_sees_validator_result() {
    let model = Arc::new(ScriptedModel::happy_path());
    generate(&model).await.expect("plan generation succeeds");

    let requests = model.requests_for(Role::PlanSynthesizer);
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.iter().any(|t| t.name == "validate_final_plan"));
    let tool_reply = requests[1]
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .expect("tool result was fed back");
    assert_eq!(tool_reply.content, SUCCESS_MESSAGE);
}

#[tokio::test]
async fn validator_feedback_drives_a_corrected_draft() {
    let mut draft = final_plan_json();
    draft.as_object_mut().unwrap().remove("nutrition_guidelines");

    let model = Arc::new(
        ScriptedModel::happy_path()
            .clear(Role::PlanSynthesizer)
            .tool_call(
                Role::PlanSynthesizer,
                "validate_final_plan",
                json!({ "plan_json": draft.to_string() }),
            )
            .tool_call(
                Role::PlanSynthesizer,
                "validate_final_plan",
                json!({ "plan_json": final_plan_json().to_string() }),
            )
            .text(Role::PlanSynthesizer, final_plan_json().to_string()),
    );
    let plan = generate(&model).await.expect("corrected plan is accepted");
    assert!(!plan.nutrition_guidelines.hydration.is_empty());

    let requests = model.requests_for(Role::PlanSynthesizer);
    assert_eq!(requests.len(), 3);
    let first_feedback = &requests[1].messages.last().unwrap().content;
    assert!(first_feedback.contains("does not match the required schema"));
    assert!(first_feedback.contains("nutrition_guidelines"));
    assert_eq!(requests[2].messages.last().unwrap().content, SUCCESS_MESSAGE);
}

#[tokio::test]
async fn metrics_prompt_reports_missing_measurements() {
    let model = Arc::new(ScriptedModel::happy_path());
    generate(&model).await.expect("plan generation succeeds");

    let request = &model.requests_for(Role::MetricsAnalyst)[0];
    let prompt = &request.messages[1].content;
    assert!(prompt.contains("- Neck: not provided"));
    assert!(prompt.contains("- Waist: not provided"));
    assert!(prompt.contains("- BMI: 21.1 ("));
    assert!(prompt.contains("Estimated body fat"));
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn prose_only_synthesis_is_extraction_failure() {
    let model = Arc::new(synthesizer_answers(
        "Train three times a week and eat well. Good luck!",
    ));
    let err = generate(&model).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Extraction);
    assert!(err.to_string().contains("no JSON object found in model output"));
}

#[tokio::test]
async fn broken_synthesis_json_is_malformed() {
    let model = Arc::new(synthesizer_answers("{\"user_summary\": {\"fitness_goal\": }"));
    let err = generate(&model).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::MalformedJson);
}

#[tokio::test]
async fn missing_body_type_is_schema_violation() {
    let mut plan = final_plan_json();
    plan["body_analysis"]
        .as_object_mut()
        .unwrap()
        .remove("body_type");
    let model = Arc::new(synthesizer_answers(plan.to_string()));

    let err = generate(&model).await.unwrap_err();
    let PipelineError::SchemaViolation(schema) = &err else {
        panic!("expected schema violation, got {err}");
    };
    assert!(schema.mentions("body_type"));
    assert!(err.to_string().contains("body_analysis.body_type"));
}

#[tokio::test]
async fn partial_week_schedule_still_produces_a_plan() {
    let training_days_only = |mut doc: serde_json::Value| {
        doc.as_array_mut()
            .unwrap()
            .retain(|item| matches!(item["day"].as_u64(), Some(1 | 3 | 5)));
        doc
    };
    let mut workout = workout_json();
    workout["weekly_schedule"] = training_days_only(workout["weekly_schedule"].take());
    let mut plan = final_plan_json();
    plan["workout_plan"]["weekly_schedule"] =
        training_days_only(plan["workout_plan"]["weekly_schedule"].take());

    let model = Arc::new(
        synthesizer_answers(plan.to_string())
            .clear(Role::WorkoutArchitect)
            .text(Role::WorkoutArchitect, workout.to_string()),
    );

    let plan = generate(&model).await.expect("a partial week is not fatal");
    let days: Vec<u8> = plan
        .workout_plan
        .weekly_schedule
        .iter()
        .map(|item| item.day)
        .collect();
    assert_eq!(days, vec![1, 3, 5]);
    assert!(plan.workout_plan.week_coverage_gap().is_some());
    assert_eq!(model.pending(Role::WorkoutArchitect), 0);
}

#[tokio::test]
async fn endless_tool_calls_hit_the_iteration_cap() {
    let mut script = ScriptedModel::happy_path().clear(Role::PlanSynthesizer);
    for _ in 0..3 {
        script = script.tool_call(
            Role::PlanSynthesizer,
            "validate_final_plan",
            json!({ "plan_json": "{}" }),
        );
    }
    let model = Arc::new(script);
    let mut crew = crew_config(model.clone());
    crew.max_tool_iterations = 2;
    let pipeline = Pipeline::new(PipelineConfig::new(crew)).unwrap();

    let err = pipeline
        .generate_plan(&sample_profile(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Orchestration);
    assert!(matches!(
        err,
        PipelineError::Orchestration(OrchestrationError::Task {
            task: TaskKind::Synthesis,
            source: TaskError::Agent(AgentError::IterationLimit { limit: 2, .. }),
        })
    ));
    assert_eq!(model.pending(Role::PlanSynthesizer), 1);
}

#[tokio::test]
async fn unparseable_workout_draft_fails_the_run() {
    let model = Arc::new(
        ScriptedModel::happy_path()
            .clear(Role::WorkoutArchitect)
            .text(Role::WorkoutArchitect, "Do push-ups every day."),
    );
    let err = generate(&model).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Orchestration);
    assert!(err.to_string().contains("workout_draft"));
    assert!(model.requests_for(Role::PlanSynthesizer).is_empty());
}

#[tokio::test]
async fn unreachable_model_is_upstream_unavailable() {
    let model = Arc::new(
        ScriptedModel::happy_path()
            .clear(Role::MetricsAnalyst)
            .fail(Role::MetricsAnalyst, ModelError::Unreachable("connection refused".into())),
    );
    let err = generate(&model).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        PipelineError::UpstreamUnavailable {
            task: TaskKind::MetricsAnalysis,
            ..
        }
    ));
    assert!(err.upstream().is_some_and(ModelError::is_unavailable));
}

#[tokio::test]
async fn rejected_credentials_are_upstream_but_not_unavailable() {
    let model = Arc::new(
        ScriptedModel::happy_path()
            .clear(Role::NutritionAdvisor)
            .fail(Role::NutritionAdvisor, ModelError::Auth("invalid api key".into())),
    );
    let err = generate(&model).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);
    let upstream = err.upstream().expect("upstream error attached");
    assert!(!upstream.is_unavailable());
    assert!(!upstream.is_retryable());
}

#[tokio::test]
async fn slow_run_times_out() {
    let model = Arc::new(
        ScriptedModel::happy_path().delay(Role::WorkoutArchitect, Duration::from_secs(30)),
    );
    let mut config = PipelineConfig::new(crew_config(model.clone()));
    config.timeout = Duration::from_millis(100);
    let pipeline = Pipeline::new(config).unwrap();

    let err = pipeline
        .generate_plan(&sample_profile(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Timeout(Deadline::Elapsed(d)) if d == Duration::from_millis(100)
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn caller_cancellation_is_timeout() {
    let model = Arc::new(
        ScriptedModel::happy_path().delay(Role::NutritionAdvisor, Duration::from_secs(30)),
    );
    let pipeline = pipeline(&model);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = pipeline
        .generate_plan(&sample_profile(), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Timeout(Deadline::Cancelled)));
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(model.requests_for(Role::PlanSynthesizer).is_empty());
}

#[tokio::test]
async fn invocations_do_not_share_state() {
    let first = Arc::new(ScriptedModel::happy_path());
    let second = Arc::new(synthesizer_answers("no plan"));

    let (a, b) = tokio::join!(generate(&first), generate(&second));
    assert!(a.is_ok());
    assert_eq!(b.unwrap_err().kind(), FailureKind::Extraction);
    assert_eq!(first.requests_for(Role::PlanSynthesizer).len(), 2);
    assert_eq!(second.requests_for(Role::PlanSynthesizer).len(), 1);
}
