//! External collaborator contracts for the candidate pipeline.
//!
//! This crate never talks to an embedding model or a language model
//! directly. Both are consumed as black boxes behind object-safe async
//! traits: the similarity collaborator returns scores and nearest
//! neighbors, the generation collaborator returns structured candidates
//! or an explicit failure. Mock implementations back the test suite.

use crate::core::task::Cognition;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A historical task surfaced by the similarity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTask {
    pub text: String,
    /// Similarity to the query text, in [0, 1].
    pub similarity: f64,
}

/// Embedding/similarity collaborator.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Semantic similarity of two texts, in [0, 1].
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64>;

    /// Up to `k` historical tasks most similar to `text`, best first.
    async fn top_k_similar(&self, text: &str, k: usize) -> Result<Vec<SimilarTask>>;
}

/// Request assembled for the generation collaborator.
///
/// Carries everything the generator needs to anchor granularity and
/// tone: the bounding tasks, surrounding document context, the user's
/// stated outcome, and similar historical tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub predecessor_text: String,
    pub successor_text: String,
    pub document_context: String,
    pub outcome_text: String,
    pub anchor_tasks: Vec<SimilarTask>,
}

/// One candidate as returned by the generation collaborator.
///
/// This is the wire schema; values are domain-validated by the pipeline
/// before they become a [`super::BridgingCandidate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub text: String,
    pub estimated_effort_hours: f32,
    pub required_cognition: Cognition,
    /// The generator's self-reported confidence, in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
}

/// Generation collaborator.
///
/// Must return schema-conformant structured output or signal failure
/// explicitly; the pipeline treats malformed output as a generation
/// failure for the gap.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// Draft up to three bridging candidates for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCandidate>>;
}
