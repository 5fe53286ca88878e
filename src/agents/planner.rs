//! Planner agent
//!
//! The cognitive core. Translates methodology text and the target caption
//! into a comprehensive textual description of the illustration. On later
//! iterations the previous critique is embedded verbatim as corrective
//! context; it is the sole feedback channel across iterations.

use crate::error::{GenerateError, Result};
use crate::provider::CapabilityProvider;
use crate::reference::ReferenceExample;

/// How many retrieved references are inlined into the planning prompt
const REFERENCE_CONTEXT_LIMIT: usize = 3;

pub struct Planner;

impl Planner {
    pub async fn plan(
        provider: &dyn CapabilityProvider,
        methodology: &str,
        caption: &str,
        references: &[ReferenceExample],
        prior_feedback: Option<&str>,
    ) -> Result<String> {
        let prompt = build_prompt(methodology, caption, references, prior_feedback);
        let description = provider.generate_text(&prompt).await?;
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "planning",
                detail: "planner returned an empty description".into(),
            });
        }
        Ok(description)
    }
}

fn build_prompt(
    methodology: &str,
    caption: &str,
    references: &[ReferenceExample],
    prior_feedback: Option<&str>,
) -> String {
    let mut reference_context = String::new();
    if !references.is_empty() {
        reference_context.push_str("\n\nREFERENCE EXAMPLES (for inspiration):\n");
        for (i, r) in references.iter().take(REFERENCE_CONTEXT_LIMIT).enumerate() {
            reference_context.push_str(&format!(
                "\nExample {num}:\nDomain: {domain}\nType: {ty}\nDescription: {desc}\n",
                num = i + 1,
                domain = r.domain,
                ty = r.diagram_type,
                desc = r.description,
            ));
        }
    }

    let feedback_context = prior_feedback
        .map(|f| format!("\n\nFEEDBACK FROM PREVIOUS ITERATION (address every point):\n{f}\n"))
        .unwrap_or_default();

    format!(
        "You are an expert at designing academic methodology diagrams for scientific publications.\n\
         \n\
         Your task is to create a COMPREHENSIVE and DETAILED textual description of an illustration \
         that would effectively visualize the given methodology. This description will be used to \
         generate the actual diagram.\n\
         \n\
         METHODOLOGY TO VISUALIZE:\n{methodology}\n\
         \n\
         TARGET DIAGRAM CAPTION:\n{caption}{reference_context}{feedback_context}\n\
         \n\
         REQUIREMENTS:\n\
         1. Layout structure: specify the overall layout (left-to-right, top-to-bottom, circular)\n\
         2. Components: list all visual elements needed (boxes, arrows, icons, labels)\n\
         3. Content: what text or symbols should appear in each component\n\
         4. Connections: how components connect (arrows, lines, groupings)\n\
         5. Hierarchy: which elements are primary vs secondary\n\
         6. Grouping: how to group related components (containers, background colors)\n\
         7. Flow: the logical flow of information through the diagram\n\
         8. Key details: important technical details, equations, or annotations\n\
         \n\
         Be specific about spatial relationships and positioning, describe the logical flow \
         clearly (input to process to output), and include any mathematical notation. The target \
         audience is academic researchers.\n\
         \n\
         OUTPUT FORMAT:\n\
         Provide a detailed paragraph-form description covering all aspects above. Be thorough: \
         the description should be sufficient to create the diagram without seeing the original \
         methodology."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_feedback_verbatim() {
        let prompt = build_prompt("method", "caption", &[], Some("the arrows point backwards"));
        assert!(prompt.contains("the arrows point backwards"));
        assert!(prompt.contains("FEEDBACK FROM PREVIOUS ITERATION"));
    }

    #[test]
    fn prompt_caps_reference_context_at_three() {
        let refs: Vec<ReferenceExample> = (0..5)
            .map(|i| ReferenceExample {
                id: format!("ref_{i}"),
                domain: "CV".into(),
                diagram_type: "Architecture Diagram".into(),
                description: format!("marker_{i}"),
                image_path: String::new(),
            })
            .collect();
        let prompt = build_prompt("method", "caption", &refs, None);
        assert!(prompt.contains("marker_0"));
        assert!(prompt.contains("marker_2"));
        assert!(!prompt.contains("marker_3"));
    }

    #[test]
    fn first_iteration_has_no_feedback_section() {
        let prompt = build_prompt("method", "caption", &[], None);
        assert!(!prompt.contains("FEEDBACK FROM PREVIOUS ITERATION"));
    }
}
