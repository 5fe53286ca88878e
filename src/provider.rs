//! Capability provider boundary
//!
//! Every model-backed operation the pipeline needs is one of three narrow
//! request/response capabilities: ranking, text generation, image
//! generation. The orchestrator and agents depend only on this trait,
//! never on a concrete backend, so tests run against canned stubs and
//! production runs against the Gemini client.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A candidate handed to the ranking capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankCandidate {
    pub id: String,
    pub domain: String,
    pub diagram_type: String,
    pub description: String,
}

/// One ranked candidate id with its match score, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub score: f64,
}

/// Raw bytes plus extension hint for a generated image
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. "png"
    pub extension: String,
}

/// The three model capabilities the orchestrator sequences.
///
/// Implementations are stateless request/response boundaries; they must be
/// safe to share across concurrently running requests. Timeouts are
/// enforced by the caller, not the implementation.
#[async_trait::async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Rank `candidates` against `query`, returning at most `top_n` ids
    /// ordered from best match to worst.
    async fn rank(
        &self,
        query: &str,
        candidates: &[RankCandidate],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>>;

    /// Generate free-form text from a prompt.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Generate an image from a prompt.
    async fn generate_image(&self, prompt: &str) -> Result<ImageOutput>;

    /// Backend identifier for logging
    fn provider_name(&self) -> &str;
}
