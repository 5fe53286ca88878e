//! Reference set loading
//!
//! Reference examples are curated figure descriptions mined from published
//! papers. They are loaded once from a JSON file, filtered for entries whose
//! image file actually exists, and treated as immutable for the rest of the
//! process.

use crate::provider::RankCandidate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// One curated reference figure. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceExample {
    pub id: String,
    /// Research domain tag, e.g. "Computer Vision"
    pub domain: String,
    /// Diagram type tag, e.g. "Architecture Diagram"
    pub diagram_type: String,
    /// Caption-level textual description
    pub description: String,
    /// Path to the associated figure image
    #[serde(default)]
    pub image_path: String,
}

impl ReferenceExample {
    pub fn as_rank_candidate(&self) -> RankCandidate {
        RankCandidate {
            id: self.id.clone(),
            domain: self.domain.clone(),
            diagram_type: self.diagram_type.clone(),
            description: self.description.clone(),
        }
    }
}

/// Summary statistics over a reference set
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSetStats {
    pub total: usize,
    pub domains: BTreeMap<String, usize>,
    pub diagram_types: BTreeMap<String, usize>,
}

/// Load a reference set from a JSON file, dropping entries whose image file
/// is missing on disk. A missing file yields an empty set, not an error; a
/// run can proceed with zero references.
pub fn load_reference_set(path: impl AsRef<Path>) -> std::io::Result<Vec<ReferenceExample>> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "reference set file not found, using empty set");
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let all: Vec<ReferenceExample> = serde_json::from_str(&raw)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let total = all.len();
    let valid: Vec<ReferenceExample> = all
        .into_iter()
        .filter(|r| !r.image_path.is_empty() && Path::new(&r.image_path).exists())
        .collect();

    let missing = total - valid.len();
    if missing > 0 {
        warn!(missing, total, "reference images not found on disk");
    }
    info!(count = valid.len(), path = %path.display(), "loaded reference set");
    Ok(valid)
}

/// Tally domains and diagram types across a reference set.
pub fn reference_set_stats(refs: &[ReferenceExample]) -> ReferenceSetStats {
    let mut domains = BTreeMap::new();
    let mut diagram_types = BTreeMap::new();
    for r in refs {
        *domains.entry(r.domain.clone()).or_insert(0) += 1;
        *diagram_types.entry(r.diagram_type.clone()).or_insert(0) += 1;
    }
    ReferenceSetStats {
        total: refs.len(),
        domains,
        diagram_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample(id: &str, domain: &str, image_path: &str) -> ReferenceExample {
        ReferenceExample {
            id: id.to_string(),
            domain: domain.to_string(),
            diagram_type: "Architecture Diagram".to_string(),
            description: "A stacked encoder".to_string(),
            image_path: image_path.to_string(),
        }
    }

    #[test]
    fn missing_file_yields_empty_set() {
        let refs = load_reference_set("/nonexistent/reference_set.json").unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn entries_without_images_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("ref_0001.jpg");
        std::fs::File::create(&img)
            .unwrap()
            .write_all(b"jpg")
            .unwrap();

        let refs = vec![
            sample("ref_0001", "NLP", img.to_str().unwrap()),
            sample("ref_0002", "NLP", "/nope/ref_0002.jpg"),
            sample("ref_0003", "RL", ""),
        ];
        let json_path = dir.path().join("reference_set.json");
        std::fs::write(&json_path, serde_json::to_string(&refs).unwrap()).unwrap();

        let loaded = load_reference_set(&json_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "ref_0001");
    }

    #[test]
    fn stats_tally_by_domain_and_type() {
        let refs = vec![
            sample("a", "NLP", "x"),
            sample("b", "NLP", "x"),
            sample("c", "RL", "x"),
        ];
        let stats = reference_set_stats(&refs);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.domains["NLP"], 2);
        assert_eq!(stats.diagram_types["Architecture Diagram"], 3);
    }
}
