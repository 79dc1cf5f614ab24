//! Review session: the bounded unit of one gap-analysis interaction.
//!
//! A session covers exactly one detect → propose → decide → commit cycle
//! and enforces valid phase transitions along the way:
//!
//! Created -> Analyzing -> AwaitingReview -> Committing -> Committed
//!
//! with Aborted (zero gaps, or user cancel) and Failed (generation or
//! validation error at commit) as the other terminal states. Candidate
//! review states are explicit tagged variants, so only accepted
//! candidates can ever reach the insertion validator.

use crate::detect::{Gap, GapId};
use crate::error::{Error, Result};
use crate::insert::{AcceptedCandidate, GapInsertion};
use crate::pipeline::{
    BridgingCandidate, MAX_CANDIDATE_EFFORT_HOURS, MAX_CANDIDATE_TEXT_CHARS,
    MIN_CANDIDATE_EFFORT_HOURS, MIN_CANDIDATE_TEXT_CHARS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    Analyzing,
    AwaitingReview,
    Committing,
    Committed,
    Aborted,
    Failed,
}

impl SessionPhase {
    /// Whether the phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Committed | SessionPhase::Aborted | SessionPhase::Failed
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Created => write!(f, "created"),
            SessionPhase::Analyzing => write!(f, "analyzing"),
            SessionPhase::AwaitingReview => write!(f, "awaiting_review"),
            SessionPhase::Committing => write!(f, "committing"),
            SessionPhase::Committed => write!(f, "committed"),
            SessionPhase::Aborted => write!(f, "aborted"),
            SessionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// A record of a phase transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: SessionPhase,
    pub entered_at: DateTime<Utc>,
}

/// Review state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Proposed,
    Edited,
    Accepted,
    Rejected,
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewState::Proposed => write!(f, "proposed"),
            ReviewState::Edited => write!(f, "edited"),
            ReviewState::Accepted => write!(f, "accepted"),
            ReviewState::Rejected => write!(f, "rejected"),
        }
    }
}

/// A candidate under review, with its current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedCandidate {
    pub candidate: BridgingCandidate,
    pub state: ReviewState,
}

/// Performance metrics for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub detection_ms: u64,
    pub generation_ms: BTreeMap<GapId, u64>,
    pub insertion_ms: Option<u64>,
}

/// A caller decision on one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Accept,
    Reject,
}

/// One entry of a commit request: what to do with a candidate, with
/// optional pre-acceptance edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub candidate_id: Uuid,
    pub action: DecisionAction,
    pub edited_text: Option<String>,
    pub edited_hours: Option<f32>,
}

/// One end-to-end gap-analysis invocation over a graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: Uuid,
    /// Version of the graph snapshot this session analyzed.
    pub graph_version: u64,
    phase: SessionPhase,
    phase_history: Vec<PhaseHistoryEntry>,
    gaps: Vec<Gap>,
    candidates: BTreeMap<GapId, Vec<ReviewedCandidate>>,
    failed_gaps: BTreeMap<GapId, String>,
    pub metrics: SessionMetrics,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReviewSession {
    /// Create a session pinned to a graph snapshot version.
    pub fn new(graph_version: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph_version,
            phase: SessionPhase::Created,
            phase_history: vec![PhaseHistoryEntry {
                phase: SessionPhase::Created,
                entered_at: Utc::now(),
            }],
            gaps: Vec::new(),
            candidates: BTreeMap::new(),
            failed_gaps: BTreeMap::new(),
            metrics: SessionMetrics::default(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Check if a transition to the target phase is valid.
    pub fn can_transition(&self, target: SessionPhase) -> bool {
        matches!(
            (self.phase, target),
            (SessionPhase::Created, SessionPhase::Analyzing)
                | (SessionPhase::Analyzing, SessionPhase::AwaitingReview)
                | (SessionPhase::Analyzing, SessionPhase::Aborted)
                | (SessionPhase::Analyzing, SessionPhase::Failed)
                | (SessionPhase::AwaitingReview, SessionPhase::Committing)
                | (SessionPhase::AwaitingReview, SessionPhase::Aborted)
                | (SessionPhase::Committing, SessionPhase::Committed)
                | (SessionPhase::Committing, SessionPhase::Failed)
        )
    }

    /// Attempt to transition to a new phase.
    ///
    /// Terminal phases record `completed_at`.
    pub fn transition(&mut self, target: SessionPhase) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }
        self.phase = target;
        self.phase_history.push(PhaseHistoryEntry {
            phase: target,
            entered_at: Utc::now(),
        });
        if target.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn phase_history(&self) -> &[PhaseHistoryEntry] {
        &self.phase_history
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn candidates(&self) -> &BTreeMap<GapId, Vec<ReviewedCandidate>> {
        &self.candidates
    }

    pub fn failed_gaps(&self) -> &BTreeMap<GapId, String> {
        &self.failed_gaps
    }

    /// Record the detected gaps (during Analyzing).
    pub fn record_gaps(&mut self, gaps: Vec<Gap>) {
        self.gaps = gaps;
    }

    /// Record the pipeline output for one gap; all start Proposed.
    pub fn record_candidates(&mut self, gap: GapId, candidates: Vec<BridgingCandidate>) {
        self.candidates.insert(
            gap,
            candidates
                .into_iter()
                .map(|candidate| ReviewedCandidate {
                    candidate,
                    state: ReviewState::Proposed,
                })
                .collect(),
        );
    }

    /// Record a per-gap generation failure; the rest of the session
    /// proceeds.
    pub fn record_failed_gap(&mut self, gap: GapId, reason: String) {
        self.failed_gaps.insert(gap, reason);
    }

    fn candidate_mut(&mut self, id: Uuid) -> Result<&mut ReviewedCandidate> {
        self.candidates
            .values_mut()
            .flatten()
            .find(|c| c.candidate.id == id)
            .ok_or(Error::CandidateNotFound(id))
    }

    fn require_phase(&self, phase: SessionPhase) -> Result<()> {
        if self.phase != phase {
            return Err(Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: phase.to_string(),
            });
        }
        Ok(())
    }

    /// Edit a candidate's text and/or hours before acceptance.
    ///
    /// Only proposed or already-edited candidates can be edited, and the
    /// edited values must stay inside the candidate domain.
    pub fn edit_candidate(
        &mut self,
        id: Uuid,
        text: Option<&str>,
        hours: Option<f32>,
    ) -> Result<()> {
        self.require_phase(SessionPhase::AwaitingReview)?;
        let reviewed = self.candidate_mut(id)?;
        match reviewed.state {
            ReviewState::Proposed | ReviewState::Edited => {}
            state => {
                return Err(Error::InvalidPhaseTransition {
                    from: state.to_string(),
                    to: ReviewState::Edited.to_string(),
                })
            }
        }
        // Validate both fields before applying either, so a rejected
        // edit leaves the candidate exactly as it was.
        if let Some(text) = text {
            let chars = text.chars().count();
            if !(MIN_CANDIDATE_TEXT_CHARS..=MAX_CANDIDATE_TEXT_CHARS).contains(&chars) {
                return Err(Error::Validation(format!(
                    "edited text length {} outside {}..={}",
                    chars, MIN_CANDIDATE_TEXT_CHARS, MAX_CANDIDATE_TEXT_CHARS
                )));
            }
        }
        if let Some(hours) = hours {
            if !(MIN_CANDIDATE_EFFORT_HOURS..=MAX_CANDIDATE_EFFORT_HOURS).contains(&hours) {
                return Err(Error::Validation(format!(
                    "edited hours {} outside {}..={}",
                    hours, MIN_CANDIDATE_EFFORT_HOURS, MAX_CANDIDATE_EFFORT_HOURS
                )));
            }
        }
        if let Some(text) = text {
            reviewed.candidate.text = text.to_string();
        }
        if let Some(hours) = hours {
            reviewed.candidate.estimated_effort_hours = hours;
        }
        reviewed.state = ReviewState::Edited;
        Ok(())
    }

    /// Accept or reject a candidate.
    pub fn decide_candidate(&mut self, id: Uuid, action: &DecisionAction) -> Result<()> {
        self.require_phase(SessionPhase::AwaitingReview)?;
        let reviewed = self.candidate_mut(id)?;
        let target = match action {
            DecisionAction::Accept => ReviewState::Accepted,
            DecisionAction::Reject => ReviewState::Rejected,
        };
        match reviewed.state {
            ReviewState::Proposed | ReviewState::Edited => {
                reviewed.state = target;
                Ok(())
            }
            state => Err(Error::InvalidPhaseTransition {
                from: state.to_string(),
                to: target.to_string(),
            }),
        }
    }

    /// Apply a full decision (optional edits, then accept/reject).
    pub fn apply_decision(&mut self, decision: &Decision) -> Result<()> {
        if decision.edited_text.is_some() || decision.edited_hours.is_some() {
            self.edit_candidate(
                decision.candidate_id,
                decision.edited_text.as_deref(),
                decision.edited_hours,
            )?;
        }
        self.decide_candidate(decision.candidate_id, &decision.action)
    }

    /// The accepted candidates per gap, ready for the insertion
    /// validator. Gaps with no accepted candidates are omitted.
    pub fn accepted_insertions(&self) -> Vec<GapInsertion> {
        self.candidates
            .iter()
            .filter_map(|(gap, reviewed)| {
                let accepted: Vec<AcceptedCandidate> = reviewed
                    .iter()
                    .filter(|r| r.state == ReviewState::Accepted)
                    .map(|r| AcceptedCandidate {
                        candidate_id: r.candidate.id,
                        text: r.candidate.text.clone(),
                        estimated_effort_hours: r.candidate.estimated_effort_hours,
                        required_cognition: r.candidate.required_cognition,
                        generator_confidence: r.candidate.provider_confidence,
                        reasoning: r.candidate.reasoning.clone(),
                    })
                    .collect();
                if accepted.is_empty() {
                    None
                } else {
                    Some(GapInsertion {
                        gap: *gap,
                        accepted,
                    })
                }
            })
            .collect()
    }

    /// Candidates still proposed or edited (no accept/reject decision).
    pub fn undecided_ids(&self) -> Vec<Uuid> {
        self.candidates
            .values()
            .flatten()
            .filter(|r| matches!(r.state, ReviewState::Proposed | ReviewState::Edited))
            .map(|r| r.candidate.id)
            .collect()
    }
}
