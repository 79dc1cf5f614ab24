//! Gap detection over the ordered task sequence.
//!
//! A gap is a pair of adjacent tasks (in topological order) whose
//! transition looks like it silently skips necessary intermediate work.
//! Four independent indicators are evaluated per pair; a pair is promoted
//! to a [`Gap`] only when at least three fire, keeping the false-positive
//! rate bounded.
//!
//! Detection is a pure function of the graph snapshot: identical input
//! yields an identical gap list.

pub mod classify;

use crate::config::DetectorConfig;
use crate::core::task::{Task, TaskId};
use chrono::{DateTime, Utc};
use classify::{classify_phase, classify_skill};
use serde::{Deserialize, Serialize};

/// Identifies a gap by the pair it sits between.
///
/// Gaps never overlap within one analysis (each references a distinct
/// adjacent pair), so the pair is a stable key for the session's maps.
/// Serializes as its display form (`#2->#5`) so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GapId {
    pub predecessor: TaskId,
    pub successor: TaskId,
}

impl std::fmt::Display for GapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.predecessor, self.successor)
    }
}

impl std::str::FromStr for GapId {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (pred, succ) = s
            .split_once("->")
            .ok_or_else(|| crate::error::Error::Validation(format!("invalid gap id: {}", s)))?;
        Ok(Self {
            predecessor: pred.parse()?,
            successor: succ.parse()?,
        })
    }
}

impl Serialize for GapId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GapId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The four independent gap indicators evaluated per adjacent pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapIndicators {
    /// Effort estimate jumps by more than the configured threshold.
    pub time_gap: bool,
    /// Action phases are two or more lifecycle steps apart.
    pub action_type_jump: bool,
    /// The successor does not depend on the predecessor.
    pub missing_dependency: bool,
    /// The tasks belong to different skill domains.
    pub skill_jump: bool,
}

impl GapIndicators {
    /// Number of indicators that fired.
    pub fn count(&self) -> u8 {
        self.time_gap as u8
            + self.action_type_jump as u8
            + self.missing_dependency as u8
            + self.skill_jump as u8
    }

    /// Names of the fired indicators, for diagnostics.
    pub fn fired(&self) -> Vec<&'static str> {
        let mut fired = Vec::new();
        if self.time_gap {
            fired.push("time_gap");
        }
        if self.action_type_jump {
            fired.push("action_type_jump");
        }
        if self.missing_dependency {
            fired.push("missing_dependency");
        }
        if self.skill_jump {
            fired.push("skill_jump");
        }
        fired
    }
}

/// A detected discontinuity between two adjacent tasks.
///
/// Immutable once created; consumed by the candidate pipeline and
/// discarded when the review session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub indicators: GapIndicators,
    /// Fired-indicator fraction, in [0, 1].
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

impl Gap {
    /// The pair key identifying this gap.
    pub fn id(&self) -> GapId {
        GapId {
            predecessor: self.predecessor_id,
            successor: self.successor_id,
        }
    }
}

/// Evaluate the four indicators for one adjacent pair.
///
/// Unclassifiable text (no phase or skill keyword match) never fires its
/// indicator.
pub fn evaluate_pair(predecessor: &Task, successor: &Task, cfg: &DetectorConfig) -> GapIndicators {
    let time_gap = (successor.estimated_effort_hours - predecessor.estimated_effort_hours).abs()
        > cfg.time_gap_hours;

    let action_type_jump = match (classify_phase(&predecessor.text), classify_phase(&successor.text))
    {
        (Some(a), Some(b)) => a.ordinal().abs_diff(b.ordinal()) >= cfg.phase_jump,
        _ => false,
    };

    let missing_dependency = !successor.depends_on.contains(&predecessor.id);

    let skill_jump = match (classify_skill(&predecessor.text), classify_skill(&successor.text)) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    GapIndicators {
        time_gap,
        action_type_jump,
        missing_dependency,
        skill_jump,
    }
}

/// Scan the topologically ordered task sequence for gaps.
///
/// Every adjacent pair is scored against the four indicators; pairs where
/// at least `cfg.min_indicators` fire become gaps with confidence
/// `fired / 4`. The result is sorted by confidence descending, then by
/// predecessor id, so identical graphs always produce identical lists.
/// The caller truncates to `cfg.max_gaps`.
///
/// An empty result is a valid, expected outcome — not an error.
pub fn detect_gaps(ordered: &[&Task], cfg: &DetectorConfig) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = ordered
        .windows(2)
        .filter_map(|pair| {
            let (predecessor, successor) = (pair[0], pair[1]);
            let indicators = evaluate_pair(predecessor, successor, cfg);
            if indicators.count() < cfg.min_indicators {
                return None;
            }
            Some(Gap {
                predecessor_id: predecessor.id,
                successor_id: successor.id,
                indicators,
                confidence: f64::from(indicators.count()) / 4.0,
                detected_at: Utc::now(),
            })
        })
        .collect();

    gaps.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.predecessor_id.cmp(&b.predecessor_id))
    });
    gaps
}
