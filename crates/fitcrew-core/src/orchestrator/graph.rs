//! Task dependency graph: validation and stage grouping.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::tasks::TaskKind;

/// Structural problems in a task graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("task graph is empty")]
    Empty,

    #[error("duplicate task: {0}")]
    Duplicate(TaskKind),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        task: TaskKind,
        dependency: TaskKind,
    },

    #[error("dependency cycle among tasks: {}", join(.0))]
    Cycle(Vec<TaskKind>),
}

fn join(kinds: &[TaskKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated DAG of task nodes, grouped into stages.
///
/// Every node in a stage depends only on nodes in earlier stages, so the
/// nodes of one stage may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGraph {
    dependencies: BTreeMap<TaskKind, Vec<TaskKind>>,
    stages: Vec<Vec<TaskKind>>,
}

impl TaskGraph {
    /// The four-node plan graph with each node's declared dependencies.
    pub fn standard() -> Result<Self, GraphError> {
        Self::from_edges(
            TaskKind::ALL
                .into_iter()
                .map(|k| (k, k.dependencies().to_vec())),
        )
    }

    /// Build from `(node, dependencies)` pairs.
    pub fn from_edges(
        edges: impl IntoIterator<Item = (TaskKind, Vec<TaskKind>)>,
    ) -> Result<Self, GraphError> {
        let mut dependencies: BTreeMap<TaskKind, Vec<TaskKind>> = BTreeMap::new();
        for (task, deps) in edges {
            if dependencies.insert(task, deps).is_some() {
                return Err(GraphError::Duplicate(task));
            }
        }
        if dependencies.is_empty() {
            return Err(GraphError::Empty);
        }
        for (task, deps) in &dependencies {
            if let Some(missing) = deps.iter().find(|d| !dependencies.contains_key(*d)) {
                return Err(GraphError::UnknownDependency {
                    task: *task,
                    dependency: *missing,
                });
            }
        }
        let stages = stages(&dependencies)?;
        Ok(Self {
            dependencies,
            stages,
        })
    }

    pub fn stages(&self) -> &[Vec<TaskKind>] {
        &self.stages
    }

    pub fn dependencies(&self, task: TaskKind) -> &[TaskKind] {
        self.dependencies
            .get(&task)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes in a valid sequential execution order.
    pub fn order(&self) -> Vec<TaskKind> {
        self.stages.iter().flatten().copied().collect()
    }

    /// The last stage's single node, if the graph has one sink.
    pub fn terminal(&self) -> Option<TaskKind> {
        match self.stages.last().map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }
}

/// Kahn's algorithm, one frontier at a time.
fn stages(dependencies: &BTreeMap<TaskKind, Vec<TaskKind>>) -> Result<Vec<Vec<TaskKind>>, GraphError> {
    let mut in_degree: BTreeMap<TaskKind, usize> = dependencies
        .iter()
        .map(|(task, deps)| {
            let unique: BTreeSet<&TaskKind> = deps.iter().collect();
            (*task, unique.len())
        })
        .collect();

    let mut stages = Vec::new();
    let mut frontier: Vec<TaskKind> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(task, _)| *task)
        .collect();

    while !frontier.is_empty() {
        for task in &frontier {
            in_degree.remove(task);
        }
        let mut next = Vec::new();
        for (task, deg) in in_degree.iter_mut() {
            let unique: BTreeSet<&TaskKind> = dependencies[task].iter().collect();
            let satisfied = unique.iter().filter(|d| frontier.contains(**d)).count();
            *deg -= satisfied;
            if *deg == 0 {
                next.push(*task);
            }
        }
        stages.push(std::mem::replace(&mut frontier, next));
    }

    if !in_degree.is_empty() {
        return Err(GraphError::Cycle(in_degree.into_keys().collect()));
    }
    Ok(stages)
}
