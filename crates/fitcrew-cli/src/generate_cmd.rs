use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use fitcrew_core::anthropometry::reference_metrics;
use fitcrew_core::pipeline::Pipeline;
use fitcrew_core::schema::{FinalPlan, PlanRequest, UserProfile};

/// `-` as a path means stdin or stdout.
const STDIO: &str = "-";

/// Default output file name, e.g. `plan-20260301-141502.json`.
pub fn default_output_name(now: DateTime<Local>) -> String {
    format!("plan-{}.json", now.format("%Y%m%d-%H%M%S"))
}

/// Read and validate a plan request from a file or stdin.
pub fn read_profile(input: &Path) -> Result<UserProfile> {
    let text = if input.as_os_str() == STDIO {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read profile from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read profile {}", input.display()))?
    };
    let request: PlanRequest = serde_json::from_str(&text)
        .with_context(|| format!("profile {} is not valid JSON", input.display()))?;
    match request.into_profile() {
        Ok(profile) => Ok(profile),
        Err(e) => bail!("invalid profile {}: {e}", input.display()),
    }
}

/// Execute `fitcrew generate`.
pub async fn run_generate(pipeline: &Pipeline, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let profile = read_profile(input)?;
    let reference = reference_metrics(&profile);
    eprintln!(
        "Generating plan: goal \"{}\", {} day(s)/week, BMI {} ({})",
        profile.fitness_goal, profile.days_per_week, reference.bmi, reference.bmi_category
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling...");
            on_interrupt.cancel();
        }
    });
    let result = pipeline.generate_plan(&profile, cancel).await;
    watcher.abort();

    let plan = result.context("plan generation failed")?;
    write_plan(&plan, output)
}

fn write_plan(plan: &FinalPlan, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
    let path = output.unwrap_or_else(|| PathBuf::from(default_output_name(Local::now())));
    if path.as_os_str() == STDIO {
        println!("{json}");
        return Ok(());
    }
    std::fs::write(&path, format!("{json}\n"))
        .with_context(|| format!("failed to write plan to {}", path.display()))?;

    let training_days = plan
        .workout_plan
        .weekly_schedule
        .iter()
        .filter(|d| plan.workout_plan.workouts.contains_key(&d.activity))
        .count();
    println!("Plan written to {}", path.display());
    println!("  body type: {}", plan.body_analysis.body_type);
    println!("  workouts: {}", plan.workout_plan.workouts.len());
    println!("  training days: {training_days}/7");
    println!("  status: {}", plan.status);
    Ok(())
}
