//! Orchestrator: the iteration state machine
//!
//! Owns the retrieve-once, then plan/style/render/critique loop. Assembles
//! inputs for each agent call, enforces per-call timeouts and the retry
//! budget, appends every step to the generation history, and decides when
//! the run stops. Agents never talk to each other; critique feedback only
//! crosses iteration boundaries through the planner prompt.

use crate::agents::{Critic, Planner, Retriever, Stylist, Visualizer};
use crate::config::{Config, Mode, SelectionPolicy};
use crate::error::{GenerateError, Result};
use crate::guideline::AestheticGuideline;
use crate::history::{
    GenerationHistory, GenerationResult, IterationRecord, RequestParams, TerminationReason,
};
use crate::provider::CapabilityProvider;
use crate::reference::ReferenceExample;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One generation request. Independent requests share no mutable state and
/// may run concurrently.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Source methodology description
    pub methodology: String,
    /// Target figure caption
    pub caption: String,
    /// Structured data payload, plot mode only
    pub data: Option<serde_json::Value>,
    /// Candidate reference set the retriever ranks. Read-only.
    pub reference_set: Vec<ReferenceExample>,
}

impl GenerationRequest {
    pub fn new(methodology: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            methodology: methodology.into(),
            caption: caption.into(),
            data: None,
            reference_set: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_reference_set(mut self, reference_set: Vec<ReferenceExample>) -> Self {
        self.reference_set = reference_set;
        self
    }
}

/// Pipeline stages, in order. Retrieval runs once; the rest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieving,
    Planning,
    Styling,
    Rendering,
    Critiquing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieving => "retrieving",
            Self::Planning => "planning",
            Self::Styling => "styling",
            Self::Rendering => "rendering",
            Self::Critiquing => "critiquing",
            Self::Done => "done",
        }
    }
}

/// Cooperative cancellation flag, honored at the checkpoint between
/// iterations. Cancellation mid-call is not prompt.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A run that stopped with a typed failure. The history still explains
/// every step and retry that happened before the stop.
#[derive(Debug)]
pub struct FailedRun {
    pub error: GenerateError,
    pub history: GenerationHistory,
}

impl std::fmt::Display for FailedRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for FailedRun {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The figure generation pipeline: a provider, a shared guideline, and an
/// immutable configuration.
pub struct Pipeline {
    provider: Arc<dyn CapabilityProvider>,
    guideline: Arc<AestheticGuideline>,
    config: Config,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &"dyn CapabilityProvider")
            .field("guideline", &self.guideline)
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline. Configuration is validated here, before any
    /// provider call can be issued.
    pub fn new(provider: Arc<dyn CapabilityProvider>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            guideline: AestheticGuideline::shared_default(),
            config,
        })
    }

    /// Replace the shared default guideline with a custom one.
    pub fn with_guideline(mut self, guideline: AestheticGuideline) -> Self {
        self.guideline = Arc::new(guideline);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a request to completion without external cancellation.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, FailedRun> {
        self.generate_with_cancel(request, &CancelHandle::new()).await
    }

    /// Run a request, checking `cancel` at each inter-iteration checkpoint.
    pub async fn generate_with_cancel(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> std::result::Result<GenerationResult, FailedRun> {
        let params = RequestParams::new(&request.methodology, &request.caption, &self.config);
        let mut history = GenerationHistory::new(params);
        info!(
            run_id = %history.run_id,
            mode = self.config.mode.as_str(),
            max_iterations = self.config.max_iterations,
            provider = self.provider.provider_name(),
            "starting generation"
        );

        match self.run_state_machine(request, cancel, &mut history).await {
            Ok(reason) => {
                history.freeze(reason);
                self.persist_history(&history);

                let selected = self.select_artifact(&history).map(|r| r.artifact.clone());
                let Some(artifact) = selected else {
                    // Every Ok path appends at least one record first.
                    let error = GenerateError::Configuration(
                        "terminated run produced no iterations".into(),
                    );
                    return Err(FailedRun { error, history });
                };
                info!(
                    run_id = %history.run_id,
                    iterations = history.iterations.len(),
                    reason = ?reason,
                    artifact = %artifact.path().display(),
                    "generation complete"
                );
                Ok(GenerationResult {
                    artifact,
                    iterations_performed: history.iterations.len(),
                    termination: reason,
                    history,
                })
            }
            Err(error) => {
                history.note(format!("run failed: {} ({})", error, error.kind()));
                self.persist_history(&history);
                warn!(run_id = %history.run_id, error = %error, "generation failed");
                Err(FailedRun { error, history })
            }
        }
    }

    /// Drive the stage machine. Returns the termination reason on any path
    /// that yields a result; errors here mean no result exists at all.
    async fn run_state_machine(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
        history: &mut GenerationHistory,
    ) -> Result<TerminationReason> {
        let references = self.retrieve_references(request, history).await?;
        history.reference_subset = references.iter().map(|r| r.id.clone()).collect();

        let mut feedback: Option<String> = None;

        for iteration in 0..self.config.max_iterations {
            // Guaranteed cancellation point: between iterations only.
            if cancel.is_cancelled() {
                history.note(format!("cancelled before iteration {iteration}"));
                if iteration == 0 {
                    return Err(GenerateError::Cancelled);
                }
                return Ok(TerminationReason::Cancelled);
            }

            debug!(iteration, stage = Stage::Planning.as_str(), "entering stage");
            let planned = match self
                .call_step("planning", history, || {
                    Planner::plan(
                        self.provider.as_ref(),
                        &request.methodology,
                        &request.caption,
                        &references,
                        feedback.as_deref(),
                    )
                })
                .await
            {
                Ok(v) => v,
                Err(e) => return self.abort_iteration(e, iteration, history),
            };

            let styled = if self.config.skip_styling {
                None
            } else {
                debug!(iteration, stage = Stage::Styling.as_str(), "entering stage");
                let s = match self
                    .call_step("styling", history, || {
                        Stylist::refine(self.provider.as_ref(), &planned, &self.guideline)
                    })
                    .await
                {
                    Ok(v) => v,
                    Err(e) => return self.abort_iteration(e, iteration, history),
                };
                Some(s)
            };
            let render_description = styled.as_deref().unwrap_or(&planned).to_string();

            debug!(iteration, stage = Stage::Rendering.as_str(), "entering stage");
            let artifact = match self
                .call_step("rendering", history, || {
                    Visualizer::visualize(
                        self.provider.as_ref(),
                        self.config.mode,
                        &render_description,
                        request.data.as_ref(),
                        &self.config.output_dir,
                        iteration,
                    )
                })
                .await
            {
                Ok(v) => v,
                Err(e) => return self.abort_iteration(e, iteration, history),
            };

            if self.config.skip_refinement {
                history.append(IterationRecord {
                    index: iteration,
                    description: planned,
                    styled_description: styled,
                    artifact,
                    critique: None,
                    timestamp: Utc::now(),
                })?;
                info!(iteration, "refinement disabled, stopping after first render");
                return Ok(TerminationReason::RefinementDisabled);
            }

            debug!(iteration, stage = Stage::Critiquing.as_str(), "entering stage");
            let artifact_name = artifact.path().display().to_string();
            let critique = match self
                .call_step("critiquing", history, || {
                    Critic::critique(
                        self.provider.as_ref(),
                        &request.methodology,
                        &request.caption,
                        &render_description,
                        &artifact_name,
                        iteration,
                    )
                })
                .await
            {
                Ok(v) => v,
                Err(e) => return self.abort_iteration(e, iteration, history),
            };

            let accepted = critique.accept;
            feedback = Some(critique.refinement_prompt(&render_description));

            history.append(IterationRecord {
                index: iteration,
                description: planned,
                styled_description: styled,
                artifact,
                critique: Some(critique),
                timestamp: Utc::now(),
            })?;

            if accepted {
                info!(iteration, stage = Stage::Done.as_str(), "critic accepted the artifact");
                return Ok(TerminationReason::Accepted);
            }
            if iteration + 1 == self.config.max_iterations {
                info!(
                    max_iterations = self.config.max_iterations,
                    stage = Stage::Done.as_str(),
                    "iteration bound reached"
                );
                return Ok(TerminationReason::IterationBoundReached);
            }
            debug!(iteration, "critic rejected, carrying feedback forward");
        }

        // Unreachable with max_iterations > 0; the bound check above returns.
        Ok(TerminationReason::IterationBoundReached)
    }

    /// Retrieval runs once, before the loop. Skipped entirely (no ranking
    /// call) under skip_retrieval or with an empty candidate set; a failed
    /// ranking degrades to zero references rather than failing the run.
    async fn retrieve_references(
        &self,
        request: &GenerationRequest,
        history: &mut GenerationHistory,
    ) -> Result<Vec<ReferenceExample>> {
        if self.config.skip_retrieval {
            debug!("retrieval skipped by configuration");
            return Ok(Vec::new());
        }
        if request.reference_set.is_empty() {
            debug!("no candidate reference set, skipping retrieval");
            return Ok(Vec::new());
        }

        debug!(stage = Stage::Retrieving.as_str(), "entering stage");
        let n = self.config.num_reference_examples;
        match self
            .call_step("retrieving", history, || {
                Retriever::retrieve(
                    self.provider.as_ref(),
                    &request.methodology,
                    &request.caption,
                    &request.reference_set,
                    n,
                )
            })
            .await
        {
            Ok(refs) => {
                info!(count = refs.len(), "retrieved reference examples");
                Ok(refs)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "retrieval failed after retries, proceeding with zero references");
                history.note(format!("retrieval degraded to empty: {e}"));
                Ok(Vec::new())
            }
        }
    }

    /// Abort policy when a step exhausted its retries mid-run: keep the
    /// best prior iteration if one exists, otherwise fail the request.
    fn abort_iteration(
        &self,
        error: GenerateError,
        iteration: usize,
        history: &mut GenerationHistory,
    ) -> Result<TerminationReason> {
        if error.is_fatal() {
            return Err(error);
        }
        history.note(format!(
            "iteration {iteration} aborted: {error} ({})",
            error.kind()
        ));
        if history.iterations.is_empty() {
            return Err(error);
        }
        warn!(iteration, error = %error, "aborting run with best prior iteration");
        Ok(TerminationReason::ProviderErrorBudgetExhausted)
    }

    /// Execute one capability-backed step under the per-call timeout and
    /// the retry budget. Transient failures retry with backoff up to the
    /// configured ceiling; invalid output retries exactly once; fatal
    /// kinds propagate immediately. Every retry is noted in the history.
    async fn call_step<T, F, Fut>(
        &self,
        stage: &'static str,
        history: &mut GenerationHistory,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut transient_attempts = 0usize;
        let mut invalid_attempts = 0usize;

        loop {
            let outcome = match tokio::time::timeout(self.config.provider_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(GenerateError::ProviderTimeout { stage }),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                history.note(format!("{stage}: fatal error: {error} ({})", error.kind()));
                return Err(error);
            }

            let exhausted = if matches!(error, GenerateError::InvalidAgentOutput { .. }) {
                // Shape violations get one retry, tighter than the
                // transient ceiling.
                invalid_attempts += 1;
                invalid_attempts > 1
            } else {
                transient_attempts += 1;
                transient_attempts > self.config.retry.max_retries
            };

            if exhausted {
                history.note(format!(
                    "{stage}: retries exhausted after {transient_attempts} transient / \
                     {invalid_attempts} invalid attempts: {error}"
                ));
                return Err(error);
            }

            let delay = self
                .config
                .retry
                .delay_for_attempt(transient_attempts.saturating_sub(1));
            history.note(format!("{stage}: retrying after error: {error}"));
            warn!(stage, error = %error, delay_ms = delay.as_millis() as u64, "retrying step");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Pick the final record from a frozen history: the latest accepted
    /// iteration when one exists, else whatever the configured selection
    /// policy names.
    pub fn select_artifact<'a>(
        &self,
        history: &'a GenerationHistory,
    ) -> Option<&'a IterationRecord> {
        if let Some(accepted) = history.last_accepted() {
            return Some(accepted);
        }
        match self.config.selection {
            SelectionPolicy::LastIteration => history.iterations.last(),
            SelectionPolicy::FirstIteration => history.iterations.first(),
        }
    }

    /// Best-effort persistence of the audit document. Failure to write the
    /// history never fails the run it documents.
    fn persist_history(&self, history: &GenerationHistory) {
        if let Err(e) = std::fs::create_dir_all(&self.config.output_dir) {
            warn!(error = %e, "could not create output directory for history");
            return;
        }
        let path = self
            .config
            .output_dir
            .join(format!("history_{}.json", history.run_id));
        match history.save(&path) {
            Ok(()) => debug!(path = %path.display(), "history persisted"),
            Err(e) => warn!(error = %e, "failed to persist history"),
        }
    }
}

/// Convenience wrapper: build a default-configured pipeline for `mode` and
/// run a single request.
pub async fn generate_illustration(
    provider: Arc<dyn CapabilityProvider>,
    request: &GenerationRequest,
    mode: Mode,
) -> std::result::Result<GenerationResult, FailedRun> {
    let config = Config {
        mode,
        ..Default::default()
    };
    let pipeline = Pipeline::new(provider, config).map_err(|error| FailedRun {
        error,
        history: GenerationHistory::new(RequestParams::new(
            &request.methodology,
            &request.caption,
            &Config::default(),
        )),
    })?;
    pipeline.generate(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Retrieving.as_str(), "retrieving");
        assert_eq!(Stage::Critiquing.as_str(), "critiquing");
        assert_eq!(Stage::Done.as_str(), "done");
    }

    #[test]
    fn cancel_handle_round_trips() {
        let cancel = CancelHandle::new();
        assert!(!cancel.is_cancelled());
        let clone = cancel.clone();
        clone.cancel();
        assert!(cancel.is_cancelled());
    }
}
