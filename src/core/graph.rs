//! Plan graph: the task store for one plan.
//!
//! The graph owns every task of a single plan and its dependency edges
//! (implicit in each task's `depends_on` set). It is represented as an
//! explicit adjacency structure — an ordinal-ordered map from id to task —
//! which keeps ownership simple and serialization trivial.
//!
//! Invariant: the edge set forms a DAG at all times after any committed
//! mutation. Construction and replacement validate acyclicity; the only
//! mutation path is the insertion validator, which swaps in a fully
//! validated replacement in one step.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The dependency graph of one plan.
///
/// Readers may hold the graph at any time; every committed mutation
/// produces a new value with a bumped version, so a reader sees either
/// the pre-commit or post-commit graph, never an intermediate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGraph {
    tasks: BTreeMap<TaskId, Task>,
    version: u64,
}

impl PlanGraph {
    /// Build a graph from a set of tasks, enforcing all invariants.
    ///
    /// # Errors
    ///
    /// Returns a validation error for duplicate ids, unknown dependency
    /// ids, or self-dependencies, and a cycle error (naming an offending
    /// edge) if the dependency set is not a DAG.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for task in tasks {
            let id = task.id;
            if map.insert(id, task).is_some() {
                return Err(Error::Validation(format!("duplicate task id {}", id)));
            }
        }
        Self::validate(&map)?;
        Ok(Self {
            tasks: map,
            version: 1,
        })
    }

    /// Validate invariants over a task map: dependency ids must exist,
    /// no self-dependencies, and the edge set must be acyclic.
    pub(crate) fn validate(tasks: &BTreeMap<TaskId, Task>) -> Result<()> {
        for task in tasks.values() {
            for dep in &task.depends_on {
                if *dep == task.id {
                    return Err(Error::Validation(format!(
                        "task {} depends on itself",
                        task.id
                    )));
                }
                if !tasks.contains_key(dep) {
                    return Err(Error::Validation(format!(
                        "task {} depends on unknown task {}",
                        task.id, dep
                    )));
                }
            }
        }
        kahn_order(tasks)
            .map(|_| ())
            .map_err(|(from, to)| Error::Cycle { from, to })
    }

    /// Produce the replacement graph for a committed mutation.
    ///
    /// Validates the full updated task map; on success the returned graph
    /// carries the next version. The current graph is untouched — the
    /// caller swaps the value in one step.
    pub(crate) fn replaced_with(&self, tasks: BTreeMap<TaskId, Task>) -> Result<Self> {
        Self::validate(&tasks)?;
        Ok(Self {
            tasks,
            version: self.version + 1,
        })
    }

    /// Version of this snapshot; bumped by every committed mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get a task by id.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Check whether a task exists.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the graph has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.tasks.values().map(|t| t.depends_on.len()).sum()
    }

    /// Tasks in ordinal id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub(crate) fn task_map(&self) -> &BTreeMap<TaskId, Task> {
        &self.tasks
    }

    /// Ids of tasks that depend on `id`.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.depends_on.contains(id))
            .map(|t| t.id)
            .collect()
    }

    /// Whether `of` depends on `on`, directly or transitively.
    pub fn depends_transitively(&self, of: &TaskId, on: &TaskId) -> bool {
        let mut stack: Vec<TaskId> = match self.tasks.get(of) {
            Some(task) => task.depends_on.iter().copied().collect(),
            None => return false,
        };
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == *on {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(task) = self.tasks.get(&id) {
                stack.extend(task.depends_on.iter().copied());
            }
        }
        false
    }

    /// Tasks in topological order, ties broken by ordinal id.
    ///
    /// Deterministic for a given graph snapshot. Cannot fail: the graph
    /// was validated acyclic at construction.
    pub fn topological_order(&self) -> Vec<&Task> {
        let order = kahn_order(&self.tasks).unwrap_or_default();
        order.iter().filter_map(|id| self.tasks.get(id)).collect()
    }
}

/// Kahn's algorithm over a task map.
///
/// Computes in-degrees, repeatedly removes zero-in-degree nodes (smallest
/// ordinal first, making the order deterministic), decrementing dependents.
/// If fewer nodes are removed than exist, a cycle remains; the error names
/// one offending edge inside it.
pub(crate) fn kahn_order(
    tasks: &BTreeMap<TaskId, Task>,
) -> std::result::Result<Vec<TaskId>, (TaskId, TaskId)> {
    let mut in_degree: BTreeMap<TaskId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();

    for task in tasks.values() {
        in_degree.entry(task.id).or_insert(0);
        for dep in &task.depends_on {
            *in_degree.entry(task.id).or_insert(0) += 1;
            dependents.entry(*dep).or_default().push(task.id);
        }
    }

    let mut ready: BTreeSet<TaskId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    while let Some(id) = ready.iter().next().copied() {
        ready.remove(&id);
        order.push(id);
        if let Some(deps) = dependents.get(&id) {
            for dependent in deps {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
    }

    if order.len() < tasks.len() {
        // A cycle remains among the nodes that never reached zero
        // in-degree. Name one edge inside it.
        let remaining: BTreeSet<TaskId> = in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| *id)
            .collect();
        let to = *remaining.iter().next().unwrap();
        let from = tasks[&to]
            .depends_on
            .iter()
            .find(|dep| remaining.contains(dep))
            .copied()
            .unwrap_or(to);
        return Err((from, to));
    }

    Ok(order)
}
