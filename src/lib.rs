//! paperfig
//!
//! Agentic generation of publication-ready methodology figures. A small
//! team of model-backed agents is coordinated through an iterative
//! plan → render → critique loop:
//!
//! ```text
//! Request ──► Retriever ──► Planner ──► Stylist ──► Visualizer ──► Critic
//!              (once)          ▲                                     │
//!                              └────────── feedback ◄────────────────┘
//! ```
//!
//! # Features
//!
//! - **Orchestrator**: explicit stage machine with a bounded refinement
//!   loop, per-call timeouts, and a bounded-backoff retry budget
//! - **Capability boundary**: rank / generate_text / generate_image behind
//!   one trait, so stubs and the Gemini backend are interchangeable
//! - **Audit trail**: append-only per-run history, persisted as JSON and
//!   re-loadable without touching any provider
//! - **Ablations**: retrieval, styling, and refinement each switch off
//!   independently for controlled comparisons
//! - **Modes**: rendered diagram images, or matplotlib generator code for
//!   statistical plots (never executed here)

pub mod agents;
pub mod config;
pub mod error;
pub mod gemini;
pub mod guideline;
pub mod history;
pub mod orchestrator;
pub mod provider;
pub mod reference;
pub mod retry;

pub use config::{Config, Mode, SelectionPolicy};
pub use error::GenerateError;
pub use gemini::GeminiProvider;
pub use guideline::AestheticGuideline;
pub use history::{
    Artifact, Critique, GenerationHistory, GenerationResult, IterationRecord, RequestParams,
    TerminationReason,
};
pub use orchestrator::{
    generate_illustration, CancelHandle, FailedRun, GenerationRequest, Pipeline, Stage,
};
pub use provider::{CapabilityProvider, ImageOutput, RankCandidate, RankedCandidate};
pub use reference::{load_reference_set, reference_set_stats, ReferenceExample};
pub use retry::RetryPolicy;
