//! The system boundary: start a gap analysis, commit a session.
//!
//! `GapService` owns one plan graph and enforces single-writer semantics
//! over it: at most one review session may hold uncommitted proposals at
//! a time, while concurrent readers may snapshot the graph freely. The
//! commit is the only mutating operation and swaps the graph in one
//! atomic step — a reader sees either the pre-commit or post-commit
//! graph, never an intermediate state.
//!
//! Candidate generation for distinct gaps is independent and fans out
//! with bounded parallelism; each gap is a separate cancellation-aware
//! suspension point, so abandoning a session cancels in-flight calls and
//! discards their results. Nothing is written until explicit commit, so
//! no orphaned writes are possible.

use crate::config::Config;
use crate::core::graph::PlanGraph;
use crate::core::task::TaskId;
use crate::detect::{detect_gaps, Gap, GapId};
use crate::error::{Error, Result};
use crate::insert::insert_accepted;
use crate::pipeline::provider::{CandidateGenerator, SimilarityProvider};
use crate::pipeline::{BridgingCandidate, CandidatePipeline};
use crate::session::{Decision, ReviewSession, SessionPhase};
use crate::{seam_log, seam_warn};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Result of starting a gap analysis.
///
/// `phase` is `AwaitingReview` when there is something to review and
/// `Aborted` when no gaps were found (a valid outcome, not an error) or
/// the session was abandoned mid-analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub gaps: Vec<Gap>,
    pub candidates_by_gap: BTreeMap<GapId, Vec<BridgingCandidate>>,
    /// Gaps whose generation failed, with enough context to retry.
    pub failed_gaps: BTreeMap<GapId, String>,
}

/// Result of a committed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub session_id: Uuid,
    /// Ids of the newly inserted tasks, in insertion order.
    pub inserted_task_ids: Vec<TaskId>,
    /// Candidates the caller never decided on; they were not inserted.
    pub undecided_candidates: Vec<Uuid>,
}

struct ServiceState {
    sessions: BTreeMap<Uuid, ReviewSession>,
    /// The one session allowed to hold uncommitted proposals.
    active: Option<Uuid>,
    /// Cancellation for the active session's in-flight generation.
    cancel: CancellationToken,
}

/// Orchestrates gap analysis and reviewed insertion over one plan graph.
pub struct GapService {
    graph: RwLock<PlanGraph>,
    pipeline: CandidatePipeline,
    config: Config,
    state: Mutex<ServiceState>,
}

impl GapService {
    pub fn new(
        graph: PlanGraph,
        similarity: Arc<dyn SimilarityProvider>,
        generator: Arc<dyn CandidateGenerator>,
        config: Config,
    ) -> Self {
        let pipeline =
            CandidatePipeline::new(similarity, generator, config.pipeline.clone());
        Self {
            graph: RwLock::new(graph),
            pipeline,
            config,
            state: Mutex::new(ServiceState {
                sessions: BTreeMap::new(),
                active: None,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Snapshot of the current graph. Safe at any time.
    pub async fn graph(&self) -> PlanGraph {
        self.graph.read().await.clone()
    }

    /// Id of the session currently holding uncommitted proposals.
    pub async fn active_session(&self) -> Option<Uuid> {
        self.state.lock().await.active
    }

    /// Snapshot of a session, for polling.
    pub async fn session(&self, session_id: Uuid) -> Result<ReviewSession> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(Error::SessionNotFound(session_id))
    }

    /// Run one end-to-end gap analysis: detect gaps, generate candidates
    /// per gap with bounded parallelism, and open a review session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionActive`] when another session already
    /// holds uncommitted proposals for this graph. Per-gap generation
    /// failures do not fail the analysis; they are reported in
    /// `failed_gaps` so the caller can retry just those gaps.
    pub async fn start_analysis(
        &self,
        outcome_text: &str,
        document_context: &str,
    ) -> Result<AnalysisReport> {
        let snapshot = Arc::new(self.graph.read().await.clone());

        // Register the session and its cancellation token under the lock,
        // then release it for the long-running generation fan-out.
        let (session_id, cancel) = {
            let mut state = self.state.lock().await;
            if let Some(active_id) = state.active {
                let still_open = state
                    .sessions
                    .get(&active_id)
                    .map(|s| !s.phase().is_terminal())
                    .unwrap_or(false);
                if still_open {
                    return Err(Error::SessionActive(active_id));
                }
            }
            let mut session = ReviewSession::new(snapshot.version());
            session.transition(SessionPhase::Analyzing)?;
            let session_id = session.id;
            let cancel = CancellationToken::new();
            state.active = Some(session_id);
            state.cancel = cancel.clone();
            state.sessions.insert(session_id, session);
            (session_id, cancel)
        };

        let detection_started = Instant::now();
        let ordered = snapshot.topological_order();
        let mut gaps = detect_gaps(&ordered, &self.config.detector);
        gaps.truncate(self.config.detector.max_gaps);
        let detection_ms = detection_started.elapsed().as_millis() as u64;
        seam_log!(
            "analysis {}: {} gap(s) in {}ms over {} task(s)",
            session_id,
            gaps.len(),
            detection_ms,
            snapshot.len()
        );

        if gaps.is_empty() {
            let mut state = self.state.lock().await;
            let session = state
                .sessions
                .get_mut(&session_id)
                .ok_or(Error::SessionNotFound(session_id))?;
            session.metrics.detection_ms = detection_ms;
            session.transition(SessionPhase::Aborted)?;
            state.active = None;
            return Ok(AnalysisReport {
                session_id,
                phase: SessionPhase::Aborted,
                gaps: vec![],
                candidates_by_gap: BTreeMap::new(),
                failed_gaps: BTreeMap::new(),
            });
        }

        // Bounded parallel fan-out; gaps reference disjoint pairs, so
        // completion order is irrelevant.
        let outcome_text = outcome_text.to_string();
        let document_context = document_context.to_string();
        let results: Vec<(GapId, u64, Result<Vec<BridgingCandidate>>)> =
            stream::iter(gaps.clone())
                .map(|gap| {
                    let pipeline = self.pipeline.clone();
                    let snapshot = Arc::clone(&snapshot);
                    let outcome_text = outcome_text.clone();
                    let document_context = document_context.clone();
                    let cancel = cancel.clone();
                    async move {
                        let started = Instant::now();
                        let result = tokio::select! {
                            _ = cancel.cancelled() => Err(Error::GenerationFailed {
                                gap: gap.id().to_string(),
                                reason: "session abandoned".to_string(),
                            }),
                            result = pipeline.generate_candidates(
                                &gap,
                                &snapshot,
                                &outcome_text,
                                &document_context,
                            ) => result,
                        };
                        (gap.id(), started.elapsed().as_millis() as u64, result)
                    }
                })
                .buffer_unordered(self.config.pipeline.max_parallel_gaps)
                .collect()
                .await;

        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;

        if cancel.is_cancelled() || session.phase().is_terminal() {
            // Abandoned mid-analysis: results are discarded.
            return Ok(AnalysisReport {
                session_id,
                phase: session.phase(),
                gaps,
                candidates_by_gap: BTreeMap::new(),
                failed_gaps: BTreeMap::new(),
            });
        }

        session.metrics.detection_ms = detection_ms;
        session.record_gaps(gaps.clone());
        for (gap_id, generation_ms, result) in results {
            session.metrics.generation_ms.insert(gap_id, generation_ms);
            match result {
                Ok(candidates) => session.record_candidates(gap_id, candidates),
                Err(e) => {
                    seam_warn!("analysis {}: gap {} failed: {}", session_id, gap_id, e);
                    session.record_failed_gap(gap_id, e.to_string());
                }
            }
        }
        session.transition(SessionPhase::AwaitingReview)?;

        Ok(AnalysisReport {
            session_id,
            phase: session.phase(),
            gaps,
            candidates_by_gap: session
                .candidates()
                .iter()
                .map(|(gap, reviewed)| {
                    (*gap, reviewed.iter().map(|r| r.candidate.clone()).collect())
                })
                .collect(),
            failed_gaps: session.failed_gaps().clone(),
        })
    }

    /// Apply the caller's decisions and commit the accepted candidates.
    ///
    /// Decisions are validated against a copy of the session first, so a
    /// malformed decision list (unknown candidate id, out-of-domain
    /// edit) rejects the whole commit and leaves the session reviewable.
    /// A cycle or stale graph fails the session; the graph is untouched
    /// in every error case. A second commit of a committed session is
    /// rejected by the phase machine.
    pub async fn commit_session(
        &self,
        session_id: Uuid,
        decisions: &[Decision],
    ) -> Result<CommitOutcome> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;

        if session.phase() != SessionPhase::AwaitingReview {
            return Err(Error::InvalidPhaseTransition {
                from: session.phase().to_string(),
                to: SessionPhase::Committing.to_string(),
            });
        }

        // All-or-nothing decision application.
        let mut decided = session.clone();
        for decision in decisions {
            decided.apply_decision(decision)?;
        }
        *session = decided;

        session.transition(SessionPhase::Committing)?;

        let mut graph = self.graph.write().await;
        if graph.version() != session.graph_version {
            let err = Error::StaleGraph {
                expected: session.graph_version,
                actual: graph.version(),
            };
            session.transition(SessionPhase::Failed)?;
            state.active = None;
            return Err(err);
        }

        let insertion_started = Instant::now();
        let insertions = session.accepted_insertions();
        let outcome = match insert_accepted(&graph, &insertions) {
            Ok(outcome) => outcome,
            Err(e) => {
                seam_warn!("commit {}: rejected: {}", session_id, e);
                session.transition(SessionPhase::Failed)?;
                state.active = None;
                return Err(e);
            }
        };
        session.metrics.insertion_ms = Some(insertion_started.elapsed().as_millis() as u64);

        // The atomic step: replace the graph value in one assignment.
        *graph = outcome.graph;
        drop(graph);

        session.transition(SessionPhase::Committed)?;
        state.active = None;

        let inserted_task_ids: Vec<TaskId> =
            outcome.inserted.iter().map(|(_, task_id)| *task_id).collect();
        seam_log!(
            "commit {}: inserted {} task(s)",
            session_id,
            inserted_task_ids.len()
        );

        let undecided_candidates = state
            .sessions
            .get(&session_id)
            .map(|s| s.undecided_ids())
            .unwrap_or_default();

        Ok(CommitOutcome {
            session_id,
            inserted_task_ids,
            undecided_candidates,
        })
    }

    /// Abandon a session: cancel in-flight generation and discard its
    /// proposals. Nothing was written, so there is nothing to roll back.
    pub async fn abandon_session(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        if session.phase().is_terminal() {
            return Err(Error::InvalidPhaseTransition {
                from: session.phase().to_string(),
                to: SessionPhase::Aborted.to_string(),
            });
        }
        session.transition(SessionPhase::Aborted)?;
        if state.active == Some(session_id) {
            state.cancel.cancel();
            state.active = None;
        }
        Ok(())
    }
}
