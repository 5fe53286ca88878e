//! Visualizer agent
//!
//! Renders the final description into an artifact. Diagram mode calls the
//! image capability and writes the bytes to disk; plot mode asks the text
//! capability for matplotlib code and writes the source file. Artifacts are
//! named with the iteration index so no iteration ever overwrites another.
//! The plot code is never executed here.

use crate::config::Mode;
use crate::error::{GenerateError, Result};
use crate::history::Artifact;
use crate::provider::CapabilityProvider;
use std::path::Path;
use tracing::debug;

pub struct Visualizer;

impl Visualizer {
    /// Render `description` into the artifact for `iteration`, placed in
    /// `output_dir` as `figure_iter{iteration}.{ext}`.
    pub async fn visualize(
        provider: &dyn CapabilityProvider,
        mode: Mode,
        description: &str,
        data: Option<&serde_json::Value>,
        output_dir: &Path,
        iteration: usize,
    ) -> Result<Artifact> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| GenerateError::ArtifactIo {
                stage: "rendering",
                detail: e.to_string(),
            })?;

        match mode {
            Mode::Diagram => Self::render_diagram(provider, description, output_dir, iteration).await,
            Mode::Plot => Self::render_plot(provider, description, data, output_dir, iteration).await,
        }
    }

    async fn render_diagram(
        provider: &dyn CapabilityProvider,
        description: &str,
        output_dir: &Path,
        iteration: usize,
    ) -> Result<Artifact> {
        let prompt = format!(
            "Generate a high-quality academic methodology diagram with the following \
             specifications:\n\n{description}\n\n\
             Requirements:\n\
             - Professional academic publication quality\n\
             - Clear, readable text and labels\n\
             - Consistent styling throughout\n\
             - Appropriate use of colors and shapes\n\
             - Publication-ready resolution"
        );

        let image = provider.generate_image(&prompt).await?;
        if image.bytes.is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "rendering",
                detail: "image capability returned no bytes".into(),
            });
        }

        let ext = if image.extension.is_empty() {
            "png"
        } else {
            &image.extension
        };
        let path = output_dir.join(format!("figure_iter{iteration}.{ext}"));
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| GenerateError::ArtifactIo {
                stage: "rendering",
                detail: e.to_string(),
            })?;
        debug!(path = %path.display(), bytes = image.bytes.len(), "wrote diagram artifact");
        Ok(Artifact::Image { path })
    }

    async fn render_plot(
        provider: &dyn CapabilityProvider,
        description: &str,
        data: Option<&serde_json::Value>,
        output_dir: &Path,
        iteration: usize,
    ) -> Result<Artifact> {
        let data_context = data
            .map(|d| format!("\n\nDATA PROVIDED:\n{d}\n"))
            .unwrap_or_default();

        let prompt = format!(
            "You are an expert at creating publication-quality statistical plots using Matplotlib.\n\
             \n\
             Generate complete, executable Python code using Matplotlib to create the following \
             plot:\n\n{description}{data_context}\n\
             Requirements:\n\
             1. Professional academic styling\n\
             2. Clear axis labels with units\n\
             3. Legend if multiple series\n\
             4. Figure sized for publication (around 6x4 inches)\n\
             5. Saved as high-resolution PNG (300 dpi minimum)\n\
             \n\
             OUTPUT FORMAT:\n\
             Provide ONLY the complete Python code, ready to execute. Start with the necessary \
             imports and end with plt.savefig(). No explanations outside code comments."
        );

        let code = provider.generate_text(&prompt).await?;
        let code = strip_code_fences(&code);
        if code.is_empty() {
            return Err(GenerateError::InvalidAgentOutput {
                stage: "rendering",
                detail: "plot capability returned no code".into(),
            });
        }

        let path = output_dir.join(format!("figure_iter{iteration}.py"));
        tokio::fs::write(&path, &code)
            .await
            .map_err(|e| GenerateError::ArtifactIo {
                stage: "rendering",
                detail: e.to_string(),
            })?;
        debug!(path = %path.display(), "wrote plot generator code");
        Ok(Artifact::PlotCode {
            path,
            data: data.cloned(),
        })
    }
}

/// Drop a surrounding markdown code fence, with or without a language tag.
fn strip_code_fences(code: &str) -> String {
    let trimmed = code.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("python").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_code_is_unwrapped() {
        let code = "```python\nimport matplotlib.pyplot as plt\nplt.savefig('out.png')\n```";
        let stripped = strip_code_fences(code);
        assert!(stripped.starts_with("import matplotlib"));
        assert!(stripped.ends_with("plt.savefig('out.png')"));
    }

    #[test]
    fn bare_fence_is_unwrapped() {
        assert_eq!(strip_code_fences("```\nx = 1\n```"), "x = 1");
    }

    #[test]
    fn unfenced_code_is_untouched() {
        assert_eq!(strip_code_fences("x = 1\n"), "x = 1");
    }
}
