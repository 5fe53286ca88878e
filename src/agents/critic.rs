//! Critic agent
//!
//! Closes the refinement loop. Evaluates the current description against
//! the methodology and caption, then emits structured findings and an
//! explicit accept/reject decision. The orchestrator interprets only the
//! decision; the issue text flows verbatim into the next planning call.

use crate::error::{GenerateError, Result};
use crate::history::Critique;
use crate::provider::CapabilityProvider;

pub struct Critic;

impl Critic {
    pub async fn critique(
        provider: &dyn CapabilityProvider,
        methodology: &str,
        caption: &str,
        description: &str,
        artifact_name: &str,
        iteration: usize,
    ) -> Result<Critique> {
        let prompt = build_prompt(methodology, caption, description, artifact_name, iteration);
        let text = provider.generate_text(&prompt).await?;
        if text.trim().is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "critiquing",
                detail: "critic returned an empty critique".into(),
            });
        }
        Ok(parse_critique(&text))
    }
}

fn build_prompt(
    methodology: &str,
    caption: &str,
    description: &str,
    artifact_name: &str,
    iteration: usize,
) -> String {
    format!(
        "You are an expert reviewer of academic illustrations, specializing in methodology \
         diagrams.\n\
         \n\
         Critically evaluate the illustration description below (rendered as {artifact_name}) \
         and provide constructive feedback.\n\
         \n\
         ORIGINAL METHODOLOGY:\n{methodology}\n\
         \n\
         TARGET CAPTION:\n{caption}\n\
         \n\
         CURRENT ILLUSTRATION DESCRIPTION (iteration {iteration}):\n{description}\n\
         \n\
         Evaluate faithfulness (are all key aspects of the methodology represented, is the \
         flow correct), conciseness (appropriate information density), readability (logical \
         layout, clear labels), and aesthetics (professional visual design).\n\
         \n\
         OUTPUT FORMAT:\n\
         Structure your response exactly as:\n\
         \n\
         ISSUES:\n\
         1. [SEVERITY] Issue description\n\
         2. [SEVERITY] Issue description\n\
         \n\
         SUGGESTIONS:\n\
         1. Specific suggestion\n\
         2. Specific suggestion\n\
         \n\
         DECISION: [READY / NEEDS_REFINEMENT]\n\
         REASONING: Brief explanation of the decision"
    )
}

/// Parse the critic's sectioned output. An unparseable decision defaults to
/// reject, so refinement continues rather than stopping on garbage.
fn parse_critique(text: &str) -> Critique {
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();
    let mut accept = false;

    #[derive(PartialEq)]
    enum Section {
        None,
        Issues,
        Suggestions,
    }
    let mut section = Section::None;

    for line in text.lines() {
        let upper = line.trim().to_uppercase();

        if upper.starts_with("ISSUES:") || upper == "ISSUES" {
            section = Section::Issues;
            continue;
        }
        if upper.starts_with("SUGGESTIONS:") || upper.starts_with("SUGGESTION") {
            section = Section::Suggestions;
            continue;
        }
        if upper.starts_with("DECISION:") {
            section = Section::None;
            accept = upper.contains("READY") && !upper.contains("NEEDS_REFINEMENT");
            continue;
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let is_item = line.starts_with('-')
            || line.starts_with('*')
            || line.chars().next().is_some_and(|c| c.is_ascii_digit());
        if !is_item {
            continue;
        }
        let item = line
            .trim_start_matches(['-', '*'])
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
            .trim()
            .to_string();
        if item.is_empty() {
            continue;
        }

        match section {
            Section::Issues => issues.push(item),
            Section::Suggestions => suggestions.push(item),
            Section::None => {}
        }
    }

    Critique {
        issues,
        suggestions,
        feedback: text.trim().to_string(),
        accept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ISSUES:
1. [MAJOR] Missing connection between encoder and decoder
2. [MINOR] Caption font too small

SUGGESTIONS:
1. Add an elbow connector between stages
- Use 14pt labels

DECISION: NEEDS_REFINEMENT
REASONING: Structural gap must be fixed.";

    #[test]
    fn parses_issues_and_suggestions() {
        let c = parse_critique(SAMPLE);
        assert_eq!(c.issues.len(), 2);
        assert!(c.issues[0].contains("Missing connection"));
        assert_eq!(c.suggestions.len(), 2);
        assert!(c.suggestions[1].contains("14pt labels"));
        assert!(!c.accept);
        assert_eq!(c.feedback, SAMPLE.trim());
    }

    #[test]
    fn ready_decision_accepts() {
        let c = parse_critique("ISSUES:\n\nSUGGESTIONS:\n\nDECISION: READY\nREASONING: fine");
        assert!(c.accept);
        assert!(c.issues.is_empty());
    }

    #[test]
    fn missing_decision_defaults_to_reject() {
        let c = parse_critique("Looks plausible overall but hard to say.");
        assert!(!c.accept);
    }

    #[test]
    fn needs_refinement_wins_over_ready_mention() {
        let c = parse_critique("DECISION: READY or NEEDS_REFINEMENT? NEEDS_REFINEMENT");
        assert!(!c.accept);
    }
}
