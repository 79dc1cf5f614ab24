//! Bridging-candidate pipeline.
//!
//! For one detected gap, the pipeline assembles a generation request
//! (bounding tasks, document context, stated outcome, historical
//! anchors), invokes the external generation collaborator, validates the
//! returned candidates against the wire schema and domain bounds, drops
//! near-duplicates of existing work, and scores the survivors with a
//! composite confidence.
//!
//! Failures are scoped to the gap: a generator error, a timeout, or a
//! result that filters down to nothing all surface as a generation
//! failure for this gap only, leaving the rest of the session intact.

pub mod provider;

use crate::config::PipelineConfig;
use crate::core::graph::PlanGraph;
use crate::core::task::Cognition;
use crate::detect::{Gap, GapId};
use crate::error::{Error, Result};
use crate::{seam_debug, seam_warn};
use provider::{CandidateGenerator, GenerationRequest, RawCandidate, SimilarityProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Text bounds (chars) for a candidate.
pub const MIN_CANDIDATE_TEXT_CHARS: usize = 10;
pub const MAX_CANDIDATE_TEXT_CHARS: usize = 200;

/// Effort bounds (hours) for a candidate.
pub const MIN_CANDIDATE_EFFORT_HOURS: f32 = 8.0;
pub const MAX_CANDIDATE_EFFORT_HOURS: f32 = 160.0;

/// An AI-proposed task intended to fill a gap, prior to user acceptance.
///
/// Candidates live only inside a review session; an accepted candidate
/// becomes a task at commit and the candidate is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgingCandidate {
    pub id: Uuid,
    pub gap: GapId,
    pub text: String,
    pub estimated_effort_hours: f32,
    pub required_cognition: Cognition,
    /// The generator's original self-reported confidence, in [0, 1].
    pub provider_confidence: f64,
    /// Composite confidence, in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    /// Max similarity against every existing task in the plan.
    pub similarity_to_existing: f64,
    /// Max similarity against the historical anchor set.
    pub similarity_to_history: f64,
}

/// Validate a raw candidate against the wire domain.
///
/// Returns the reason the candidate is invalid, if any.
fn schema_violation(raw: &RawCandidate) -> Option<String> {
    let chars = raw.text.chars().count();
    if !(MIN_CANDIDATE_TEXT_CHARS..=MAX_CANDIDATE_TEXT_CHARS).contains(&chars) {
        return Some(format!(
            "text length {} outside {}..={}",
            chars, MIN_CANDIDATE_TEXT_CHARS, MAX_CANDIDATE_TEXT_CHARS
        ));
    }
    if !(MIN_CANDIDATE_EFFORT_HOURS..=MAX_CANDIDATE_EFFORT_HOURS)
        .contains(&raw.estimated_effort_hours)
    {
        return Some(format!(
            "estimated_effort_hours {} outside {}..={}",
            raw.estimated_effort_hours, MIN_CANDIDATE_EFFORT_HOURS, MAX_CANDIDATE_EFFORT_HOURS
        ));
    }
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Some(format!("confidence {} outside 0..=1", raw.confidence));
    }
    None
}

/// The candidate pipeline for one plan.
///
/// Holds the two external collaborator seams and the pipeline tunables.
/// Cheap to clone; the collaborators are shared.
#[derive(Clone)]
pub struct CandidatePipeline {
    similarity: Arc<dyn SimilarityProvider>,
    generator: Arc<dyn CandidateGenerator>,
    config: PipelineConfig,
}

impl CandidatePipeline {
    pub fn new(
        similarity: Arc<dyn SimilarityProvider>,
        generator: Arc<dyn CandidateGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            similarity,
            generator,
            config,
        }
    }

    /// Generate scored bridging candidates for one gap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationFailed`] when the generation
    /// collaborator errors or times out, when its output fails schema
    /// validation down to zero candidates, or when deduplication filters
    /// every survivor. The failure names the gap so the caller can retry
    /// just this gap.
    pub async fn generate_candidates(
        &self,
        gap: &Gap,
        graph: &PlanGraph,
        outcome_text: &str,
        document_context: &str,
    ) -> Result<Vec<BridgingCandidate>> {
        let gap_id = gap.id();
        let predecessor = graph
            .get(&gap.predecessor_id)
            .ok_or(Error::TaskNotFound(gap.predecessor_id))?;
        let successor = graph
            .get(&gap.successor_id)
            .ok_or(Error::TaskNotFound(gap.successor_id))?;

        // Anchor granularity and tone on how similar work was broken
        // down before.
        let anchor_query = format!("{} {}", predecessor.text, successor.text);
        let anchors = self
            .similarity
            .top_k_similar(&anchor_query, self.config.anchor_k)
            .await
            .map_err(|e| generation_failed(gap_id, &e.to_string()))?;

        let request = GenerationRequest {
            predecessor_text: predecessor.text.clone(),
            successor_text: successor.text.clone(),
            document_context: document_context.to_string(),
            outcome_text: outcome_text.to_string(),
            anchor_tasks: anchors.clone(),
        };

        let raw = tokio::time::timeout(
            self.config.generation_timeout(),
            self.generator.generate(&request),
        )
        .await
        .map_err(|_| {
            generation_failed(
                gap_id,
                &format!(
                    "timed out after {:?}",
                    self.config.generation_timeout()
                ),
            )
        })?
        .map_err(|e| generation_failed(gap_id, &e.to_string()))?;

        let mut candidates = Vec::new();
        for candidate in raw {
            if let Some(reason) = schema_violation(&candidate) {
                seam_warn!("gap {}: dropping malformed candidate: {}", gap_id, reason);
                continue;
            }
            match self.score(gap, graph, &anchors, candidate).await? {
                Some(scored) => candidates.push(scored),
                None => {} // duplicate, already logged
            }
        }

        if candidates.is_empty() {
            return Err(generation_failed(
                gap_id,
                "no valid candidates after filtering",
            ));
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.max_candidates);
        Ok(candidates)
    }

    /// Deduplicate and score one validated candidate.
    ///
    /// Returns `Ok(None)` when the candidate duplicates existing work
    /// (an intentional, logged no-op — never surfaced as an error).
    async fn score(
        &self,
        gap: &Gap,
        graph: &PlanGraph,
        anchors: &[provider::SimilarTask],
        raw: RawCandidate,
    ) -> Result<Option<BridgingCandidate>> {
        let gap_id = gap.id();

        let mut similarity_to_existing: f64 = 0.0;
        for task in graph.tasks() {
            let sim = self
                .similarity
                .similarity(&raw.text, &task.text)
                .await
                .map_err(|e| generation_failed(gap_id, &e.to_string()))?;
            similarity_to_existing = similarity_to_existing.max(sim);
        }
        if similarity_to_existing > self.config.dedup_threshold {
            seam_debug!(
                "gap {}: dropping duplicate candidate (similarity {:.2}): {}",
                gap_id,
                similarity_to_existing,
                raw.text
            );
            return Ok(None);
        }

        let mut similarity_to_history: f64 = 0.0;
        for anchor in anchors {
            let sim = self
                .similarity
                .similarity(&raw.text, &anchor.text)
                .await
                .map_err(|e| generation_failed(gap_id, &e.to_string()))?;
            similarity_to_history = similarity_to_history.max(sim);
        }

        // Blend "does this resemble how similar work was broken down
        // before" with gap strength and the generator's own certainty.
        let confidence = (self.config.weight_history * similarity_to_history
            + self.config.weight_gap * gap.confidence
            + self.config.weight_provider * raw.confidence)
            .clamp(0.0, 1.0);

        Ok(Some(BridgingCandidate {
            id: Uuid::new_v4(),
            gap: gap_id,
            text: raw.text,
            estimated_effort_hours: raw.estimated_effort_hours,
            required_cognition: raw.required_cognition,
            provider_confidence: raw.confidence,
            confidence,
            reasoning: raw.reasoning,
            similarity_to_existing,
            similarity_to_history,
        }))
    }
}

fn generation_failed(gap: GapId, reason: &str) -> Error {
    Error::GenerationFailed {
        gap: gap.to_string(),
        reason: reason.to_string(),
    }
}
