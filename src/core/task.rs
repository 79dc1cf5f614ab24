//! Task data model for the planning DAG.
//!
//! Tasks are the nodes of a plan graph. Each task carries its effort
//! estimate, cognition requirement, dependency set, and provenance
//! (user-extracted at ingestion or AI-generated by an accepted insertion).

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Effort bounds (hours) for a committed task.
pub const MIN_EFFORT_HOURS: f32 = 1.0;
pub const MAX_EFFORT_HOURS: f32 = 200.0;

/// Stable, ordinal-sortable task identifier.
///
/// User-extracted tasks get whole ordinals (`#1`, `#2`, ...). Tasks
/// inserted between neighbors take free whole slots when available
/// (`#3`, `#4` between `#2` and `#5`), or fractional minors otherwise
/// (`#2.1`, `#2.2` between `#2` and `#3`). Existing tasks are never
/// renumbered.
///
/// Serializes as its display form (`#2.1`) so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId {
    pub major: u32,
    pub minor: u32,
}

impl Serialize for TaskId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl TaskId {
    /// A whole-ordinal id (`minor == 0`).
    pub fn ordinal(major: u32) -> Self {
        Self { major, minor: 0 }
    }

    /// A fractional id between two whole ordinals.
    pub fn fractional(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether this id sits on a whole ordinal.
    pub fn is_whole(&self) -> bool {
        self.minor == 0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.minor == 0 {
            write!(f, "#{}", self.major)
        } else {
            write!(f, "#{}.{}", self.major, self.minor)
        }
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| Error::Validation(format!("invalid task id: {}", s)))
        };
        match s.split_once('.') {
            Some((major, minor)) => Ok(Self {
                major: parse(major)?,
                minor: parse(minor)?,
            }),
            None => Ok(Self::ordinal(parse(s)?)),
        }
    }
}

/// Cognition a task demands of whoever executes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cognition {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Cognition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cognition::Low => write!(f, "low"),
            Cognition::Medium => write!(f, "medium"),
            Cognition::High => write!(f, "high"),
        }
    }
}

/// Where a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Extracted from the user's plan at ingestion.
    UserExtracted,
    /// Inserted by an accepted bridging candidate.
    AiGenerated,
}

impl std::fmt::Display for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskSource::UserExtracted => write!(f, "user_extracted"),
            TaskSource::AiGenerated => write!(f, "ai_generated"),
        }
    }
}

/// Generation provenance retained for audit on AI-generated tasks.
///
/// Records which gap the task bridged and the generator's original
/// self-reported confidence and reasoning, even when the user edited the
/// task text or hours before acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub generator_confidence: f64,
    pub reasoning: String,
}

/// A single task in the plan graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable ordinal-sortable identifier.
    pub id: TaskId,
    /// What the task is.
    pub text: String,
    /// Estimated effort in hours, domain-validated 1–200.
    pub estimated_effort_hours: f32,
    /// Cognition the task demands.
    pub required_cognition: Cognition,
    /// Ids of tasks this task depends on. The edge set over all tasks
    /// must stay acyclic; `PlanGraph` enforces that.
    pub depends_on: BTreeSet<TaskId>,
    /// Origin of the task.
    pub source: TaskSource,
    /// Present iff `source == AiGenerated`.
    pub provenance: Option<Provenance>,
    /// AI-generated tasks carry this flag until a human has reviewed
    /// the committed plan.
    pub requires_review: bool,
    /// When the task entered the graph.
    pub created_at: DateTime<Utc>,
}

fn validate_effort(hours: f32) -> Result<()> {
    if !(MIN_EFFORT_HOURS..=MAX_EFFORT_HOURS).contains(&hours) {
        return Err(Error::Validation(format!(
            "estimated_effort_hours {} outside {}..={}",
            hours, MIN_EFFORT_HOURS, MAX_EFFORT_HOURS
        )));
    }
    Ok(())
}

impl Task {
    /// Create a user-extracted task.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the text is empty or the effort is
    /// outside the 1–200h domain.
    pub fn extracted(
        id: TaskId,
        text: &str,
        estimated_effort_hours: f32,
        required_cognition: Cognition,
        depends_on: BTreeSet<TaskId>,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::Validation("task text must not be empty".to_string()));
        }
        validate_effort(estimated_effort_hours)?;
        Ok(Self {
            id,
            text: text.to_string(),
            estimated_effort_hours,
            required_cognition,
            depends_on,
            source: TaskSource::UserExtracted,
            provenance: None,
            requires_review: false,
            created_at: Utc::now(),
        })
    }

    /// Create an AI-generated bridging task from an accepted candidate.
    ///
    /// Bridging tasks always require review and carry provenance.
    pub fn bridging(
        id: TaskId,
        text: &str,
        estimated_effort_hours: f32,
        required_cognition: Cognition,
        depends_on: BTreeSet<TaskId>,
        provenance: Provenance,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::Validation("task text must not be empty".to_string()));
        }
        validate_effort(estimated_effort_hours)?;
        Ok(Self {
            id,
            text: text.to_string(),
            estimated_effort_hours,
            required_cognition,
            depends_on,
            source: TaskSource::AiGenerated,
            provenance: Some(provenance),
            requires_review: true,
            created_at: Utc::now(),
        })
    }
}
