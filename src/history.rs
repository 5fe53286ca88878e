//! Generation history: the append-only audit trail of a run
//!
//! Every run produces exactly one `GenerationHistory` document. It is
//! created at request start, appended to once per iteration, frozen at
//! termination, and persisted as JSON. The document alone is enough to
//! reconstruct a `GenerationResult` without re-invoking any provider.

use crate::config::{Config, Mode};
use crate::error::{GenerateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Rendered output of one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Diagram mode: a rendered image on disk
    Image { path: PathBuf },
    /// Plot mode: generator source plus bound data. Never executed here.
    PlotCode {
        path: PathBuf,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Self::Image { path } => path,
            Self::PlotCode { path, .. } => path,
        }
    }
}

/// Structured critic output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Specific findings, most severe first as emitted by the critic
    pub issues: Vec<String>,
    /// Concrete improvement suggestions
    pub suggestions: Vec<String>,
    /// Full critique text, forwarded verbatim to the next planning call
    pub feedback: String,
    /// Whether the critic accepted the artifact as-is
    pub accept: bool,
}

impl Critique {
    /// Corrective context handed to the next planning call.
    pub fn refinement_prompt(&self, description: &str) -> String {
        let issues = self
            .issues
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let suggestions = self
            .suggestions
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "CURRENT DESCRIPTION:\n{description}\n\n\
             IDENTIFIED ISSUES:\n{issues}\n\n\
             SUGGESTIONS FOR IMPROVEMENT:\n{suggestions}\n\n\
             FULL CRITIQUE:\n{feedback}\n\n\
             Please revise the description to address these issues and \
             incorporate the suggestions. Maintain all correct elements \
             while fixing the identified problems.",
            feedback = self.feedback
        )
    }
}

/// One completed pass through plan/style/render/critique. Immutable once
/// appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 0-based, contiguous
    pub index: usize,
    /// Planner output used this iteration
    pub description: String,
    /// Stylist output, present only when styling ran
    pub styled_description: Option<String>,
    pub artifact: Artifact,
    /// Absent when refinement is disabled
    pub critique: Option<Critique>,
    pub timestamp: DateTime<Utc>,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Critic accepted an iteration
    Accepted,
    /// max_iterations reached without acceptance
    IterationBoundReached,
    /// skip_refinement produced a single render
    RefinementDisabled,
    /// Transient provider retries exhausted after at least one complete
    /// iteration
    ProviderErrorBudgetExhausted,
    /// Cancelled at an inter-iteration checkpoint after at least one
    /// complete iteration
    Cancelled,
}

/// Request parameters echoed into the history for reproducibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub methodology: String,
    pub caption: String,
    pub mode: Mode,
    pub max_iterations: usize,
    pub num_reference_examples: usize,
    pub skip_retrieval: bool,
    pub skip_styling: bool,
    pub skip_refinement: bool,
}

impl RequestParams {
    pub fn new(methodology: &str, caption: &str, config: &Config) -> Self {
        Self {
            methodology: methodology.to_string(),
            caption: caption.to_string(),
            mode: config.mode,
            max_iterations: config.max_iterations,
            num_reference_examples: config.num_reference_examples,
            skip_retrieval: config.skip_retrieval,
            skip_styling: config.skip_styling,
            skip_refinement: config.skip_refinement,
        }
    }
}

/// The sole externally visible record of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationHistory {
    pub run_id: Uuid,
    pub params: RequestParams,
    /// Ids of the retrieved reference subset, ranked best first
    pub reference_subset: Vec<String>,
    pub iterations: Vec<IterationRecord>,
    /// Set exactly once at termination
    pub termination: Option<TerminationReason>,
    /// Error/retry notes explaining a run that stopped short
    pub terminal_notes: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl GenerationHistory {
    pub fn new(params: RequestParams) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            params,
            reference_subset: Vec::new(),
            iterations: Vec::new(),
            termination: None,
            terminal_notes: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append the next iteration record. Indices must arrive contiguous
    /// from 0; a frozen history rejects appends.
    pub fn append(&mut self, record: IterationRecord) -> Result<()> {
        if self.termination.is_some() {
            return Err(GenerateError::Configuration(
                "history is frozen, run already terminated".into(),
            ));
        }
        if record.index != self.iterations.len() {
            return Err(GenerateError::Configuration(format!(
                "non-contiguous iteration index {} (expected {})",
                record.index,
                self.iterations.len()
            )));
        }
        self.iterations.push(record);
        Ok(())
    }

    /// Record an error/retry/abort note for the audit trail.
    pub fn note(&mut self, note: impl Into<String>) {
        self.terminal_notes.push(note.into());
    }

    /// Freeze the history with its termination reason.
    pub fn freeze(&mut self, reason: TerminationReason) {
        if self.termination.is_none() {
            self.termination = Some(reason);
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.termination.is_some()
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Reload a persisted history document.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Highest-indexed iteration the critic accepted, if any.
    pub fn last_accepted(&self) -> Option<&IterationRecord> {
        self.iterations
            .iter()
            .rev()
            .find(|r| r.critique.as_ref().is_some_and(|c| c.accept))
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub artifact: Artifact,
    pub iterations_performed: usize,
    pub termination: TerminationReason,
    pub history: GenerationHistory,
}

impl GenerationResult {
    /// Reconstruct a result from a frozen history, without invoking any
    /// provider. The artifact choice mirrors the orchestrator: the latest
    /// accepted iteration if one exists, else the last iteration.
    pub fn from_history(history: GenerationHistory) -> Result<Self> {
        let termination = history.termination.ok_or_else(|| {
            GenerateError::Configuration("history is not frozen, cannot build result".into())
        })?;
        let record = history
            .last_accepted()
            .or_else(|| history.iterations.last())
            .ok_or_else(|| {
                GenerateError::Configuration("history contains no iterations".into())
            })?;
        let artifact = record.artifact.clone();
        let iterations_performed = history.iterations.len();
        Ok(Self {
            artifact,
            iterations_performed,
            termination,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn record(index: usize, accept: Option<bool>) -> IterationRecord {
        IterationRecord {
            index,
            description: format!("description {index}"),
            styled_description: None,
            artifact: Artifact::Image {
                path: PathBuf::from(format!("fig_iter{index}.png")),
            },
            critique: accept.map(|accept| Critique {
                issues: vec!["arrow missing".into()],
                suggestions: vec!["add the arrow".into()],
                feedback: "needs work".into(),
                accept,
            }),
            timestamp: Utc::now(),
        }
    }

    fn history() -> GenerationHistory {
        GenerationHistory::new(RequestParams::new("method", "caption", &Config::default()))
    }

    #[test]
    fn append_enforces_contiguous_indices() {
        let mut h = history();
        h.append(record(0, Some(false))).unwrap();
        assert!(h.append(record(2, Some(false))).is_err());
        h.append(record(1, Some(false))).unwrap();
        assert_eq!(h.iterations.len(), 2);
    }

    #[test]
    fn frozen_history_rejects_appends() {
        let mut h = history();
        h.append(record(0, Some(true))).unwrap();
        h.freeze(TerminationReason::Accepted);
        assert!(h.is_frozen());
        assert!(h.append(record(1, None)).is_err());
    }

    #[test]
    fn result_prefers_last_accepted_iteration() {
        let mut h = history();
        h.append(record(0, Some(true))).unwrap();
        h.append(record(1, Some(false))).unwrap();
        h.freeze(TerminationReason::IterationBoundReached);

        let result = GenerationResult::from_history(h).unwrap();
        assert_eq!(result.artifact.path(), Path::new("fig_iter0.png"));
        assert_eq!(result.iterations_performed, 2);
    }

    #[test]
    fn result_falls_back_to_last_iteration() {
        let mut h = history();
        h.append(record(0, Some(false))).unwrap();
        h.append(record(1, Some(false))).unwrap();
        h.freeze(TerminationReason::IterationBoundReached);

        let result = GenerationResult::from_history(h).unwrap();
        assert_eq!(result.artifact.path(), Path::new("fig_iter1.png"));
    }

    #[test]
    fn refinement_prompt_embeds_issues_verbatim() {
        let critique = Critique {
            issues: vec!["missing connection between X and Y".into()],
            suggestions: vec!["draw an elbow connector".into()],
            feedback: "DECISION: NEEDS_REFINEMENT".into(),
            accept: false,
        };
        let prompt = critique.refinement_prompt("a diagram");
        assert!(prompt.contains("missing connection between X and Y"));
        assert!(prompt.contains("draw an elbow connector"));
        assert!(prompt.contains("DECISION: NEEDS_REFINEMENT"));
    }
}
