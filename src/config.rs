//! Configuration management
//!
//! All tunables for a run live in one immutable `Config` value, built once
//! (from the environment or programmatically) and threaded explicitly
//! through every component call. Validation happens at construction, before
//! any provider call is issued.

use crate::error::{GenerateError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Render a figure with the image capability
    Diagram,
    /// Emit matplotlib generator code; execution is the caller's job
    Plot,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagram => "diagram",
            Self::Plot => "plot",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "diagram" => Ok(Self::Diagram),
            "plot" => Ok(Self::Plot),
            other => Err(GenerateError::Configuration(format!(
                "unknown mode '{other}', expected 'diagram' or 'plot'"
            ))),
        }
    }
}

/// Policy for picking the final artifact when the critic never accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Most refined wins: the last iteration's artifact. Refinement is
    /// assumed monotonically non-decreasing, which the critic does not
    /// actually guarantee.
    LastIteration,
    /// First iteration's artifact (useful for ablation comparisons)
    FirstIteration,
}

/// Immutable run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// Upper bound on plan/render/critique iterations
    pub max_iterations: usize,
    /// How many reference examples the retriever asks for
    pub num_reference_examples: usize,
    /// Ablation: skip reference retrieval entirely
    pub skip_retrieval: bool,
    /// Ablation: skip aesthetic styling
    pub skip_styling: bool,
    /// Ablation: render once, no critique loop
    pub skip_refinement: bool,
    /// Deadline for a single capability call
    pub provider_timeout: Duration,
    /// Backoff schedule for transient provider failures
    pub retry: RetryPolicy,
    /// Directory receiving per-iteration artifacts and the history document
    pub output_dir: PathBuf,
    /// Final-artifact choice when no iteration was accepted
    pub selection: SelectionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Diagram,
            max_iterations: 3,
            num_reference_examples: 10,
            skip_retrieval: false,
            skip_styling: false,
            skip_refinement: false,
            provider_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("output"),
            selection: SelectionPolicy::LastIteration,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mode = match std::env::var("PAPERFIG_MODE") {
            Ok(v) => Mode::parse(&v)?,
            Err(_) => Mode::Diagram,
        };

        let max_iterations = env_parse("PAPERFIG_MAX_ITERATIONS", 3)?;
        let num_reference_examples = env_parse("PAPERFIG_NUM_REFERENCES", 10)?;
        let provider_timeout_secs: u64 = env_parse("PAPERFIG_PROVIDER_TIMEOUT_SECS", 120)?;

        let output_dir = std::env::var("PAPERFIG_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("output"));

        let config = Self {
            mode,
            max_iterations,
            num_reference_examples,
            skip_retrieval: env_flag("PAPERFIG_SKIP_RETRIEVAL"),
            skip_styling: env_flag("PAPERFIG_SKIP_STYLING"),
            skip_refinement: env_flag("PAPERFIG_SKIP_REFINEMENT"),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            retry: RetryPolicy::default(),
            output_dir,
            selection: SelectionPolicy::LastIteration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid parameter combinations before any provider call.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(GenerateError::Configuration(
                "max_iterations must be positive".into(),
            ));
        }
        if self.num_reference_examples == 0 {
            return Err(GenerateError::Configuration(
                "num_reference_examples must be positive".into(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(GenerateError::Configuration(
                "provider_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| GenerateError::Configuration(format!("invalid value for {name}: '{v}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.num_reference_examples, 10);
        assert_eq!(config.mode, Mode::Diagram);
        assert_eq!(config.selection, SelectionPolicy::LastIteration);
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = Config {
            max_iterations: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(Mode::parse("diagram").is_ok());
        assert!(Mode::parse("Plot").is_ok());
        assert!(Mode::parse("sculpture").is_err());
    }
}
