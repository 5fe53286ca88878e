//! Stylist agent
//!
//! Design consultant pass: rewrites a planned description against the
//! shared aesthetic guideline, preserving content and structure while
//! adding concrete visual specifications.

use crate::error::{GenerateError, Result};
use crate::guideline::AestheticGuideline;
use crate::provider::CapabilityProvider;

pub struct Stylist;

impl Stylist {
    pub async fn refine(
        provider: &dyn CapabilityProvider,
        description: &str,
        guideline: &AestheticGuideline,
    ) -> Result<String> {
        let prompt = build_prompt(description, guideline);
        let styled = provider.generate_text(&prompt).await?;
        let styled = styled.trim().to_string();
        if styled.is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "styling",
                detail: "stylist returned an empty description".into(),
            });
        }
        Ok(styled)
    }
}

fn build_prompt(description: &str, guideline: &AestheticGuideline) -> String {
    format!(
        "You are an expert design consultant specializing in academic publication illustrations.\n\
         \n\
         Take the initial diagram description below and enhance it with specific aesthetic and \
         design details to create a polished, publication-ready illustration that follows \
         academic standards.\n\
         \n\
         INITIAL DESCRIPTION:\n{description}\n\
         \n\
         AESTHETIC GUIDELINES TO FOLLOW:\n{guideline}\n\
         \n\
         Refine the description by adding color specifications (hex codes from the palette), \
         exact shapes and styling, typography choices, visual hierarchy, spacing and alignment \
         details, and professional finishing touches.\n\
         \n\
         IMPORTANT:\n\
         - Preserve ALL content and structural information from the initial description\n\
         - Add aesthetic details WITHOUT changing the fundamental design or information flow\n\
         - Be specific with measurements, colors, and styling parameters\n\
         \n\
         OUTPUT FORMAT:\n\
         Provide the enhanced description as a detailed, flowing paragraph that integrates the \
         original content with the aesthetic specifications, precise enough for an image \
         generation model to render accurately.",
        guideline = guideline.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_description_and_guideline() {
        let guideline = AestheticGuideline::custom("use only pastel blue");
        let prompt = build_prompt("three boxes and an arrow", &guideline);
        assert!(prompt.contains("three boxes and an arrow"));
        assert!(prompt.contains("use only pastel blue"));
    }
}
