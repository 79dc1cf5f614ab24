//! Insertion validation and atomic graph mutation.
//!
//! The only path that mutates a plan graph. Given the accepted
//! candidates for each gap, the validator allocates new ordinal ids
//! between the bounding tasks, chains dependency edges through the new
//! tasks, and verifies the entire updated graph is still acyclic before
//! producing the replacement snapshot. All candidates of a commit
//! succeed or none are applied; the input graph is never touched.

use crate::core::graph::PlanGraph;
use crate::core::task::{Cognition, Provenance, Task, TaskId};
use crate::detect::GapId;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An accepted candidate, carrying the values to insert.
///
/// Text and hours are the user-facing values at acceptance time — edited
/// ones if the user edited them. The generator's original confidence and
/// reasoning ride along into provenance for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedCandidate {
    pub candidate_id: Uuid,
    pub text: String,
    pub estimated_effort_hours: f32,
    pub required_cognition: Cognition,
    pub generator_confidence: f64,
    pub reasoning: String,
}

/// The accepted candidates for one gap, in review order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapInsertion {
    pub gap: GapId,
    pub accepted: Vec<AcceptedCandidate>,
}

/// Result of a validated insertion.
#[derive(Debug, Clone)]
pub struct InsertionOutcome {
    /// The replacement graph; the caller swaps it in atomically.
    pub graph: PlanGraph,
    /// Candidate id to new task id, in insertion order.
    pub inserted: Vec<(Uuid, TaskId)>,
}

/// Allocate `count` ids strictly between `pred` and `succ`.
///
/// Free whole ordinals are preferred (`#3`, `#4` between `#2` and `#5`);
/// when they cannot fit the whole batch, fractional minors on the
/// predecessor are used instead (`#2.1`, `#2.2` between `#2` and `#3`).
/// Existing tasks are never renumbered, so a span whose id space is
/// exhausted fails validation.
fn allocate_ids(
    working: &BTreeMap<TaskId, Task>,
    pred: TaskId,
    succ: TaskId,
    count: usize,
) -> Result<Vec<TaskId>> {
    // Whole slots strictly between the bounds.
    if succ > pred {
        let start = pred.major + 1;
        let end = if succ.minor == 0 {
            succ.major.saturating_sub(1)
        } else {
            succ.major
        };
        let mut whole: Vec<TaskId> = Vec::with_capacity(count);
        for major in start..=end {
            let id = TaskId::ordinal(major);
            if id > pred && id < succ && !working.contains_key(&id) {
                whole.push(id);
                if whole.len() == count {
                    return Ok(whole);
                }
            }
        }
    }

    // Fractional fallback: minors on the predecessor's major.
    let minor_bound = if succ > pred && succ.major == pred.major {
        succ.minor
    } else {
        u32::MAX
    };
    let mut fractional = Vec::with_capacity(count);
    let mut minor = pred.minor + 1;
    while minor < minor_bound && fractional.len() < count {
        let id = TaskId::fractional(pred.major, minor);
        if (succ <= pred || id < succ) && !working.contains_key(&id) {
            fractional.push(id);
        }
        minor += 1;
    }
    if fractional.len() < count {
        return Err(Error::Validation(format!(
            "cannot allocate {} task ids between {} and {}",
            count, pred, succ
        )));
    }
    Ok(fractional)
}

/// Validate and apply accepted candidates, producing the replacement
/// graph.
///
/// New tasks are chained: the first depends on the predecessor, each
/// subsequent one on the previous new task, and the successor's
/// dependency on the predecessor (when present) is replaced by the last
/// new task — otherwise the last new task is added. The whole updated
/// graph is then checked for cycles.
///
/// # Errors
///
/// Returns [`Error::Cycle`] naming an offending edge if the insertion
/// would break the DAG invariant, [`Error::TaskNotFound`] for unknown
/// gap bounds, and validation errors for id-space exhaustion. In every
/// error case the input graph is unchanged and no partial mutation is
/// observable.
pub fn insert_accepted(
    graph: &PlanGraph,
    insertions: &[GapInsertion],
) -> Result<InsertionOutcome> {
    let mut working = graph.task_map().clone();
    let mut inserted = Vec::new();

    for insertion in insertions {
        if insertion.accepted.is_empty() {
            continue;
        }
        let pred_id = insertion.gap.predecessor;
        let succ_id = insertion.gap.successor;
        if !working.contains_key(&pred_id) {
            return Err(Error::TaskNotFound(pred_id));
        }
        if !working.contains_key(&succ_id) {
            return Err(Error::TaskNotFound(succ_id));
        }

        let ids = allocate_ids(&working, pred_id, succ_id, insertion.accepted.len())?;

        let mut previous = pred_id;
        for (candidate, id) in insertion.accepted.iter().zip(&ids) {
            let task = Task::bridging(
                *id,
                &candidate.text,
                candidate.estimated_effort_hours,
                candidate.required_cognition,
                [previous].into_iter().collect(),
                Provenance {
                    predecessor_id: pred_id,
                    successor_id: succ_id,
                    generator_confidence: candidate.generator_confidence,
                    reasoning: candidate.reasoning.clone(),
                },
            )?;
            working.insert(*id, task);
            inserted.push((candidate.candidate_id, *id));
            previous = *id;
        }

        // Rewire the successor through the new chain. An existing direct
        // dependency on the predecessor is superseded (it still holds
        // transitively); a missing one is the gap being closed.
        let successor = working
            .get_mut(&succ_id)
            .ok_or(Error::TaskNotFound(succ_id))?;
        successor.depends_on.remove(&pred_id);
        successor.depends_on.insert(previous);
    }

    if inserted.is_empty() {
        return Ok(InsertionOutcome {
            graph: graph.clone(),
            inserted,
        });
    }

    let graph = graph.replaced_with(working)?;
    Ok(InsertionOutcome { graph, inserted })
}
