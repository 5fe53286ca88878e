//! Aesthetic guideline shared by all requests
//!
//! The stylist rewrites descriptions against a precomputed style policy.
//! The default policy is synthesized once per process and shared read-only;
//! callers may substitute a custom one per pipeline instance.

use once_cell::sync::Lazy;
use std::sync::Arc;

/// Precomputed style policy consumed by the stylist. Opaque to the
/// orchestrator beyond "exists or not".
#[derive(Debug, Clone)]
pub struct AestheticGuideline {
    text: String,
}

impl AestheticGuideline {
    pub fn custom(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Process-wide default guideline, built once and shared.
    pub fn shared_default() -> Arc<Self> {
        Arc::clone(&DEFAULT_GUIDELINE)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

static DEFAULT_GUIDELINE: Lazy<Arc<AestheticGuideline>> = Lazy::new(|| {
    Arc::new(AestheticGuideline {
        text: DEFAULT_GUIDELINE_TEXT.to_string(),
    })
});

/// NeurIPS-style academic illustration guide: palette, shapes, connectors,
/// typography, layout.
const DEFAULT_GUIDELINE_TEXT: &str = r#"# Academic Illustration Style Guide (NeurIPS Style)

## Color Palette
- Overall aesthetic: soft tech and scientific pastels
- Background colors: Cream (#FFF8E7), Pale Blue (#E3F2FD), Mint (#E8F5E9)
- Accent colors:
  - Soft Blue (#64B5F6) for primary processes
  - Soft Orange (#FFB74D) for secondary/iterative processes
  - Soft Purple (#9575CD) for highlighting key components
  - Soft Green (#81C784) for success/outputs
- Use color to group logical components

## Shapes and Components
- Process boxes: rounded rectangles with subtle shadows
- Data/tensors: 3D stacks or layered rectangles
- Databases/storage: cylinders or drum shapes
- Agents/models: robot or brain icons with labels
- Inputs/outputs: parallelograms or cloud shapes

## Lines and Arrows
- Network/architecture diagrams: orthogonal/elbow connectors
- Logic flow: curved arrows for feedback loops
- Data flow: straight arrows with clear directionality
- Arrow styles: solid for primary flow, dashed for optional/conditional

## Typography
- Labels: sans-serif fonts (Arial, Roboto, Helvetica)
- Mathematical variables: serif italic, LaTeX notation (e.g. $P$, $P^*$)
- Font sizes: main labels 12-14pt, subscript/technical 10pt,
  section headers 16pt bold

## Layout Principles
- Hierarchy: left-to-right or top-to-bottom flow
- Grouping: containers with subtle backgrounds for related components
- Spacing: generous whitespace, consistent padding
- Alignment: grid-based layout, aligned elements

## Technical Details
- Line weight: 1.5-2pt for main elements, 1pt for details
- Corner radius: 8-12px for rounded rectangles
- Shadow: subtle drop shadow (opacity 10-20%)
- Icons: simple, consistent style throughout
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_default_is_the_same_instance() {
        let a = AestheticGuideline::shared_default();
        let b = AestheticGuideline::shared_default();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.as_str().contains("Color Palette"));
    }

    #[test]
    fn custom_guideline_overrides_text() {
        let g = AestheticGuideline::custom("monochrome only");
        assert_eq!(g.as_str(), "monochrome only");
    }
}
