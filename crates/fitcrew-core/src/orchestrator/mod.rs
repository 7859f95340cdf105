//! Stage-by-stage execution of the task graph.
//!
//! Nodes of one stage run as spawned tokio tasks that report back over an
//! mpsc channel; the next stage starts only when every node of the current
//! one has succeeded. The first failure or a cancellation aborts the nodes
//! still in flight.

pub mod graph;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agents::{Agent, AgentEvent, Crew};
use crate::anthropometry::reference_metrics;
use crate::llm::TokenUsage;
use crate::schema::UserProfile;
use crate::tasks::{TaskError, TaskKind, TaskOutput, TaskSpec, build_tasks, coerce_output, render_prompt};

pub use graph::{GraphError, TaskGraph};

/// How the nodes within one stage are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Nodes of a stage run concurrently and are joined before the next stage.
    #[default]
    Concurrent,
    /// One node at a time, in graph order.
    Sequential,
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concurrent" => Ok(Self::Concurrent),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "unknown execution mode '{other}' (expected concurrent or sequential)"
            )),
        }
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    pub mode: ExecutionMode,
}

/// Per-node statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub turns: usize,
    pub usage: TokenUsage,
    pub events: Vec<AgentEvent>,
}

/// Result of running the whole graph.
#[derive(Debug, Clone)]
pub struct CrewOutput {
    /// Raw text of the terminal node.
    pub raw: String,
    pub outputs: BTreeMap<TaskKind, TaskOutput>,
    pub reports: BTreeMap<TaskKind, NodeReport>,
}

impl CrewOutput {
    /// Tokens used across all nodes.
    pub fn usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for report in self.reports.values() {
            total.add(report.usage);
        }
        total
    }
}

/// Failures of a graph run.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("task {task} failed: {source}")]
    Task {
        task: TaskKind,
        #[source]
        source: TaskError,
    },

    #[error("orchestration cancelled")]
    Cancelled,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("no agent or task definition for {0}")]
    Unassigned(TaskKind),

    #[error("result of {0} is not available")]
    MissingResult(TaskKind),

    #[error("task {0} stopped without reporting a result")]
    NodeLost(TaskKind),
}

/// Message sent from a spawned node back to the stage loop.
struct NodeDone {
    kind: TaskKind,
    result: Result<(TaskOutput, NodeReport), TaskError>,
}

/// Runs the task graph for one invocation.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    graph: TaskGraph,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Orchestrator over the standard four-node graph.
    pub fn new(config: OrchestratorConfig) -> Result<Self, GraphError> {
        Ok(Self::with_graph(TaskGraph::standard()?, config))
    }

    pub fn with_graph(graph: TaskGraph, config: OrchestratorConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Build this invocation's tasks from `profile` and run them with `crew`.
    pub async fn run(
        &self,
        crew: Crew,
        profile: &UserProfile,
        cancel: CancellationToken,
    ) -> Result<CrewOutput, OrchestrationError> {
        let tasks = build_tasks(profile, &reference_metrics(profile));
        self.run_tasks(crew, tasks, cancel).await
    }

    /// Run prepared task specs with `crew`.
    pub async fn run_tasks(
        &self,
        crew: Crew,
        tasks: Vec<TaskSpec>,
        cancel: CancellationToken,
    ) -> Result<CrewOutput, OrchestrationError> {
        let mut agents: HashMap<TaskKind, Arc<Agent>> = HashMap::new();
        for agent in crew.into_agents() {
            if let Some(kind) = TaskKind::ALL.into_iter().find(|k| k.role() == agent.role()) {
                agents.insert(kind, Arc::new(agent));
            }
        }
        let specs: HashMap<TaskKind, TaskSpec> = tasks.into_iter().map(|t| (t.kind, t)).collect();

        let mut outputs: BTreeMap<TaskKind, TaskOutput> = BTreeMap::new();
        let mut reports: BTreeMap<TaskKind, NodeReport> = BTreeMap::new();

        for (i, stage) in self.graph.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            tracing::info!(stage = i + 1, tasks = ?stage, "starting stage");

            let mut jobs = Vec::with_capacity(stage.len());
            for &kind in stage {
                let agent = agents
                    .get(&kind)
                    .cloned()
                    .ok_or(OrchestrationError::Unassigned(kind))?;
                let spec = specs.get(&kind).ok_or(OrchestrationError::Unassigned(kind))?;
                let prompt = self.prompt_for(spec, &outputs)?;
                jobs.push((kind, agent, prompt));
            }

            let done = match self.config.mode {
                ExecutionMode::Concurrent => run_concurrent(jobs, &cancel).await?,
                ExecutionMode::Sequential => run_sequential(jobs, &cancel).await?,
            };
            for (kind, output, report) in done {
                outputs.insert(kind, output);
                reports.insert(kind, report);
            }
        }

        let terminal = self
            .graph
            .terminal()
            .ok_or(OrchestrationError::MissingResult(TaskKind::Synthesis))?;
        let raw = outputs
            .get(&terminal)
            .map(TaskOutput::context_text)
            .ok_or(OrchestrationError::MissingResult(terminal))?;

        Ok(CrewOutput {
            raw,
            outputs,
            reports,
        })
    }

    fn prompt_for(
        &self,
        spec: &TaskSpec,
        outputs: &BTreeMap<TaskKind, TaskOutput>,
    ) -> Result<String, OrchestrationError> {
        let mut context = Vec::new();
        for dep in self.graph.dependencies(spec.kind) {
            let output = outputs
                .get(dep)
                .ok_or(OrchestrationError::MissingResult(*dep))?;
            context.push((*dep, output.context_text()));
        }
        let borrowed: Vec<(TaskKind, &str)> =
            context.iter().map(|(k, text)| (*k, text.as_str())).collect();
        Ok(render_prompt(spec, &borrowed))
    }
}

/// Execute one node: run the agent, then coerce its answer.
async fn run_node(
    kind: TaskKind,
    agent: &Agent,
    prompt: &str,
) -> Result<(TaskOutput, NodeReport), TaskError> {
    let run = agent.execute(prompt).await?;
    tracing::info!(
        task = %kind,
        turns = run.turns,
        tokens = run.usage.total_tokens,
        "task finished"
    );
    let report = NodeReport {
        turns: run.turns,
        usage: run.usage,
        events: run.events,
    };
    let output = coerce_output(kind, run.output).inspect_err(|e| {
        tracing::warn!(task = %kind, error = %e, "task output rejected");
    })?;
    Ok((output, report))
}

type Job = (TaskKind, Arc<Agent>, String);
type Finished = (TaskKind, TaskOutput, NodeReport);

async fn run_sequential(
    jobs: Vec<Job>,
    cancel: &CancellationToken,
) -> Result<Vec<Finished>, OrchestrationError> {
    let mut finished = Vec::with_capacity(jobs.len());
    for (kind, agent, prompt) in jobs {
        let span = tracing::info_span!("task", task = %kind);
        let result = tokio::select! {
            r = run_node(kind, &agent, &prompt).instrument(span) => r,
            _ = cancel.cancelled() => {
                tracing::info!(task = %kind, "task cancelled");
                return Err(OrchestrationError::Cancelled);
            }
        };
        let (output, report) =
            result.map_err(|source| OrchestrationError::Task { task: kind, source })?;
        finished.push((kind, output, report));
    }
    Ok(finished)
}

/// Aborts every held task when dropped, so no node outlives its stage.
struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn run_concurrent(
    jobs: Vec<Job>,
    cancel: &CancellationToken,
) -> Result<Vec<Finished>, OrchestrationError> {
    let (tx, mut rx) = mpsc::channel::<NodeDone>(jobs.len().max(1));
    let mut handles = AbortOnDrop(Vec::with_capacity(jobs.len()));
    let mut pending: Vec<TaskKind> = Vec::with_capacity(jobs.len());

    for (kind, agent, prompt) in jobs {
        let tx = tx.clone();
        let span = tracing::info_span!("task", task = %kind);
        pending.push(kind);
        handles.0.push(tokio::spawn(
            async move {
                let result = run_node(kind, &agent, &prompt).await;
                let _ = tx.send(NodeDone { kind, result }).await;
            }
            .instrument(span),
        ));
    }
    drop(tx);

    let mut finished = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        tokio::select! {
            done = rx.recv() => {
                let Some(done) = done else {
                    return Err(OrchestrationError::NodeLost(pending[0]));
                };
                pending.retain(|k| *k != done.kind);
                match done.result {
                    Ok((output, report)) => finished.push((done.kind, output, report)),
                    Err(source) => {
                        tracing::warn!(
                            task = %done.kind,
                            in_flight = pending.len(),
                            "task failed, aborting stage"
                        );
                        return Err(OrchestrationError::Task { task: done.kind, source });
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!(in_flight = pending.len(), "stage cancelled");
                return Err(OrchestrationError::Cancelled);
            }
        }
    }
    finished.sort_by_key(|(kind, _, _)| *kind);
    Ok(finished)
}
