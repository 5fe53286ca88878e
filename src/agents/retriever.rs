//! Retriever agent
//!
//! Selects the N most relevant reference examples from the candidate set
//! using the ranking capability. The candidate set is never mutated; a
//! failed ranking degrades to zero references upstream.

use crate::error::Result;
use crate::provider::CapabilityProvider;
use crate::reference::ReferenceExample;
use tracing::debug;

pub struct Retriever;

impl Retriever {
    /// Rank `candidates` against the methodology/caption pair and return at
    /// most `n` full reference examples, best match first.
    ///
    /// Ids the ranker returns that match no candidate are ignored. If fewer
    /// than `n` ids survive, the selection is padded from the head of the
    /// candidate set, mirroring how the reference set is curated with its
    /// strongest examples first.
    pub async fn retrieve(
        provider: &dyn CapabilityProvider,
        methodology: &str,
        caption: &str,
        candidates: &[ReferenceExample],
        n: usize,
    ) -> Result<Vec<ReferenceExample>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("METHODOLOGY:\n{methodology}\n\nTARGET CAPTION:\n{caption}");
        let rank_candidates: Vec<_> = candidates.iter().map(|c| c.as_rank_candidate()).collect();

        let ranked = provider.rank(&query, &rank_candidates, n).await?;
        debug!(returned = ranked.len(), requested = n, "ranking complete");

        let mut selected: Vec<ReferenceExample> = Vec::with_capacity(n);
        for r in &ranked {
            if selected.len() >= n {
                break;
            }
            if selected.iter().any(|s| s.id == r.id) {
                continue;
            }
            if let Some(found) = candidates.iter().find(|c| c.id == r.id) {
                selected.push(found.clone());
            }
        }

        // Pad from the head of the set when the ranker under-delivers.
        if selected.len() < n {
            for c in candidates {
                if selected.len() >= n {
                    break;
                }
                if !selected.iter().any(|s| s.id == c.id) {
                    selected.push(c.clone());
                }
            }
        }

        selected.truncate(n);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ImageOutput, RankCandidate, RankedCandidate};

    struct FixedRanker(Vec<RankedCandidate>);

    #[async_trait::async_trait]
    impl CapabilityProvider for FixedRanker {
        async fn rank(
            &self,
            _query: &str,
            _candidates: &[RankCandidate],
            _top_n: usize,
        ) -> Result<Vec<RankedCandidate>> {
            Ok(self.0.clone())
        }
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            unreachable!("retriever only ranks")
        }
        async fn generate_image(&self, _prompt: &str) -> Result<ImageOutput> {
            unreachable!("retriever only ranks")
        }
        fn provider_name(&self) -> &str {
            "fixed-ranker"
        }
    }

    fn refs(ids: &[&str]) -> Vec<ReferenceExample> {
        ids.iter()
            .map(|id| ReferenceExample {
                id: id.to_string(),
                domain: "NLP".into(),
                diagram_type: "Pipeline".into(),
                description: format!("described {id}"),
                image_path: String::new(),
            })
            .collect()
    }

    fn ranked(ids: &[&str]) -> Vec<RankedCandidate> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RankedCandidate {
                id: id.to_string(),
                score: 1.0 - i as f64 * 0.1,
            })
            .collect()
    }

    #[tokio::test]
    async fn selects_in_ranked_order() {
        let provider = FixedRanker(ranked(&["ref_3", "ref_1"]));
        let candidates = refs(&["ref_1", "ref_2", "ref_3"]);
        let out = Retriever::retrieve(&provider, "m", "c", &candidates, 2)
            .await
            .unwrap();
        assert_eq!(out[0].id, "ref_3");
        assert_eq!(out[1].id, "ref_1");
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored_and_padded() {
        let provider = FixedRanker(ranked(&["ref_9", "ref_2"]));
        let candidates = refs(&["ref_1", "ref_2", "ref_3"]);
        let out = Retriever::retrieve(&provider, "m", "c", &candidates, 3)
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].id, "ref_2");
        // pad with head-of-set examples, no duplicates
        assert!(out.iter().any(|r| r.id == "ref_1"));
        assert!(out.iter().any(|r| r.id == "ref_3"));
    }

    #[tokio::test]
    async fn empty_candidate_set_short_circuits() {
        let provider = FixedRanker(vec![]);
        let out = Retriever::retrieve(&provider, "m", "c", &[], 10).await.unwrap();
        assert!(out.is_empty());
    }
}
