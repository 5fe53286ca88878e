//! History document persistence tests
//!
//! The persisted JSON history must be re-loadable and sufficient to
//! reconstruct a GenerationResult without touching any provider.

use paperfig::{
    Artifact, Critique, GenerationHistory, GenerationResult, TerminationReason,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_history(accept_on: Option<usize>, iterations: usize) -> GenerationHistory {
    use paperfig::{Config, RequestParams};

    let params = RequestParams::new(
        "We train a two-stage encoder.",
        "Figure 1: Overview",
        &Config::default(),
    );
    let mut history = GenerationHistory::new(params);
    history.reference_subset = vec!["ref_001".into(), "ref_004".into()];

    for i in 0..iterations {
        let accept = accept_on == Some(i);
        history
            .append(paperfig::IterationRecord {
                index: i,
                description: format!("planned description {i}"),
                styled_description: Some(format!("styled description {i}")),
                artifact: Artifact::Image {
                    path: PathBuf::from(format!("out/figure_iter{i}.png")),
                },
                critique: Some(Critique {
                    issues: vec![format!("issue {i}")],
                    suggestions: vec![format!("suggestion {i}")],
                    feedback: format!("full critique {i}"),
                    accept,
                }),
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
    }
    history
}

#[test]
fn save_and_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");

    let mut history = sample_history(None, 3);
    history.freeze(TerminationReason::IterationBoundReached);
    history.save(&path).unwrap();

    let loaded = GenerationHistory::load(&path).unwrap();
    assert_eq!(loaded, history);
}

#[test]
fn result_reconstructs_from_loaded_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");

    let mut history = sample_history(Some(1), 3);
    history.freeze(TerminationReason::IterationBoundReached);
    history.save(&path).unwrap();

    let loaded = GenerationHistory::load(&path).unwrap();
    let result = GenerationResult::from_history(loaded).unwrap();

    // Iteration 1 was accepted, so its artifact wins over iteration 2's.
    assert_eq!(
        result.artifact.path(),
        std::path::Path::new("out/figure_iter1.png")
    );
    assert_eq!(result.iterations_performed, 3);
    assert_eq!(result.termination, TerminationReason::IterationBoundReached);
}

#[test]
fn unfrozen_history_cannot_build_a_result() {
    let history = sample_history(None, 2);
    assert!(GenerationResult::from_history(history).is_err());
}

#[test]
fn loading_rejects_malformed_documents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(GenerationHistory::load(&path).is_err());
}
