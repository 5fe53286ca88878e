//! Gemini API provider
//!
//! Implements the capability boundary against the Gemini generateContent
//! REST API: the VLM model serves ranking and text generation, the image
//! model serves rendering. HTTP and API-level failures are mapped onto the
//! pipeline's error taxonomy here so nothing upstream ever sees a raw
//! transport error.

use crate::error::{GenerateError, Result};
use crate::provider::{CapabilityProvider, ImageOutput, RankCandidate, RankedCandidate};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Gemini-backed capability provider
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    text_model: String,
    image_model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded payload
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Build from `GEMINI_API_KEY` plus optional model overrides
    /// (`PAPERFIG_VLM_MODEL`, `PAPERFIG_IMAGE_MODEL`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| GenerateError::Configuration("GEMINI_API_KEY is not set".into()))?;
        let mut provider = Self::new(api_key);
        if let Ok(m) = std::env::var("PAPERFIG_VLM_MODEL") {
            provider.text_model = m;
        }
        if let Ok(m) = std::env::var("PAPERFIG_IMAGE_MODEL") {
            provider.image_model = m;
        }
        Ok(provider)
    }

    async fn invoke(
        &self,
        stage: &'static str,
        model: &str,
        prompt: &str,
        modalities: Option<Vec<String>>,
    ) -> Result<GenerateResponse> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
            }],
            generation_config: modalities.map(|m| GenerationConfig {
                response_modalities: Some(m),
            }),
        };

        let url = format!("{API_BASE}/{model}:generateContent");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(stage, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(stage, status, &body));
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GenerateError::InvalidAgentOutput {
                    stage,
                    detail: format!("unparseable response body: {e}"),
                })?;

        if let Some(feedback) = &parsed.prompt_feedback {
            if feedback.block_reason.is_some() {
                return Err(GenerateError::ContentPolicyRejected { stage });
            }
        }
        if parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            == Some("SAFETY")
        {
            return Err(GenerateError::ContentPolicyRejected { stage });
        }

        Ok(parsed)
    }

    fn collect_text(response: &GenerateResponse) -> String {
        response
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait::async_trait]
impl CapabilityProvider for GeminiProvider {
    async fn rank(
        &self,
        query: &str,
        candidates: &[RankCandidate],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>> {
        let prompt = build_ranking_prompt(query, candidates, top_n);
        let response = self.invoke("retrieving", &self.text_model, &prompt, None).await?;
        let text = Self::collect_text(&response);
        let ranked = parse_ranked_ids(&text, candidates, top_n);
        debug!(returned = ranked.len(), "gemini ranking parsed");
        if ranked.is_empty() && !candidates.is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "retrieving",
                detail: "ranking response contained no known candidate ids".into(),
            });
        }
        Ok(ranked)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let response = self.invoke("generating", &self.text_model, prompt, None).await?;
        Ok(Self::collect_text(&response))
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageOutput> {
        let response = self
            .invoke(
                "rendering",
                &self.image_model,
                prompt,
                Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
            )
            .await?;

        let inline = response
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
            .ok_or_else(|| GenerateError::InvalidAgentOutput {
                stage: "rendering",
                detail: "image response carried no inline data".into(),
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| GenerateError::InvalidAgentOutput {
                stage: "rendering",
                detail: format!("invalid base64 image payload: {e}"),
            })?;

        Ok(ImageOutput {
            bytes,
            extension: extension_for_mime(&inline.mime_type).to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

fn build_ranking_prompt(query: &str, candidates: &[RankCandidate], top_n: usize) -> String {
    let summary = candidates
        .iter()
        .map(|c| {
            format!(
                "ID: {}\nDomain: {}\nType: {}\nDescription: {}\n",
                c.id, c.domain, c.diagram_type, c.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert at identifying relevant academic illustration examples.\n\
         \n\
         Given a methodology description and diagram caption, select the {top_n} most relevant \
         reference examples from the provided set. Consider research domain similarity, diagram \
         type similarity, and conceptual similarity in the methodology.\n\
         \n\
         {query}\n\
         \n\
         AVAILABLE REFERENCE EXAMPLES:\n{summary}\n\
         OUTPUT FORMAT:\n\
         Return only the IDs of the {top_n} most relevant examples, one per line, ranked from \
         most to least relevant."
    )
}

/// Scan response lines for known candidate ids, preserving rank order.
/// Scores are positional: 1.0 for the top pick, decaying linearly.
fn parse_ranked_ids(
    text: &str,
    candidates: &[RankCandidate],
    top_n: usize,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = Vec::new();
    for line in text.lines() {
        if ranked.len() >= top_n {
            break;
        }
        for c in candidates {
            if line.contains(&c.id) && !ranked.iter().any(|r| r.id == c.id) {
                ranked.push(RankedCandidate {
                    id: c.id.clone(),
                    score: 0.0,
                });
                break;
            }
        }
    }
    let total = ranked.len().max(1) as f64;
    for (i, r) in ranked.iter_mut().enumerate() {
        r.score = 1.0 - (i as f64 / total);
    }
    ranked
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn map_transport_error(stage: &'static str, e: reqwest::Error) -> GenerateError {
    if e.is_timeout() {
        GenerateError::ProviderTimeout { stage }
    } else {
        GenerateError::ProviderUnavailable {
            stage,
            detail: e.to_string(),
        }
    }
}

fn map_status_error(stage: &'static str, status: reqwest::StatusCode, body: &str) -> GenerateError {
    use reqwest::StatusCode;
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return GenerateError::ProviderTimeout { stage };
    }
    // Safety blocks surface as 400s with a block reason in the body.
    if status == StatusCode::BAD_REQUEST {
        let lower = body.to_lowercase();
        if lower.contains("block") || lower.contains("safety") {
            return GenerateError::ContentPolicyRejected { stage };
        }
    }
    GenerateError::ProviderUnavailable {
        stage,
        detail: format!("HTTP {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[&str]) -> Vec<RankCandidate> {
        ids.iter()
            .map(|id| RankCandidate {
                id: id.to_string(),
                domain: "NLP".into(),
                diagram_type: "Pipeline".into(),
                description: "desc".into(),
            })
            .collect()
    }

    #[test]
    fn ranked_ids_parse_in_order_without_duplicates() {
        let text = "ref_002\nsome chatter\nref_001\nref_002\n";
        let ranked = parse_ranked_ids(text, &candidates(&["ref_001", "ref_002"]), 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "ref_002");
        assert_eq!(ranked[1].id, "ref_001");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn ranked_ids_respect_top_n() {
        let text = "ref_001\nref_002\nref_003\n";
        let ranked = parse_ranked_ids(text, &candidates(&["ref_001", "ref_002", "ref_003"]), 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn mime_extensions_default_to_png() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/pdf"), "png");
    }

    #[test]
    fn status_codes_map_to_taxonomy() {
        let err = map_status_error("planning", reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(err.is_retryable());
        let err = map_status_error("planning", reqwest::StatusCode::BAD_REQUEST, "blocked");
        assert!(!err.is_retryable());
    }
}
