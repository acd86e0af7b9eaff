//! Registering an extracted diagnostics bundle as a new run.
//!
//! Archive download and extraction happen upstream; this takes an
//! already-extracted directory, validates its structure, and creates
//! the initial aggregate with every unit at `not_started`.

use crate::metadata::RunMetadata;
use crate::store::{MetadataStore, StoreError};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Shape of the bundle's `summary.json`, as written by the collector.
#[derive(Debug, Deserialize)]
struct BundleSummary {
    #[serde(default)]
    executors: Vec<String>,
    #[serde(default)]
    coordinators: Vec<String>,
}

/// Validate an extracted bundle and persist a fresh run aggregate.
///
/// A well-formed bundle has a `summary.json` at its root listing the
/// cluster's executor and coordinator nodes; that list is fixed for
/// the lifetime of the run.
pub fn register_bundle(
    store: &MetadataStore,
    extract_dir: &Path,
    original_filename: &str,
) -> Result<RunMetadata, StoreError> {
    let summary_path = extract_dir.join("summary.json");
    if !summary_path.is_file() {
        return Err(StoreError::InvalidBundle(format!(
            "missing summary.json in {}",
            extract_dir.display()
        )));
    }

    let summary: BundleSummary = serde_json::from_str(&fs::read_to_string(&summary_path)?)?;
    let nodes = [summary.executors, summary.coordinators].concat();
    if nodes.is_empty() {
        return Err(StoreError::InvalidBundle(format!(
            "summary.json in {} lists no nodes",
            extract_dir.display()
        )));
    }
    debug!(
        bundle = original_filename,
        node_count = nodes.len(),
        "found nodes in bundle summary"
    );

    let run_id = Uuid::new_v4().to_string();
    let metadata = RunMetadata::new(run_id, original_filename, extract_dir, nodes);
    store.save(&metadata)?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AnalysisState;

    #[test]
    fn test_register_reads_node_list_from_summary() {
        let data = tempfile::tempdir().unwrap();
        let extract = tempfile::tempdir().unwrap();
        fs::write(
            extract.path().join("summary.json"),
            r#"{"executors": ["exec-1", "exec-2"], "coordinators": ["coord-1"]}"#,
        )
        .unwrap();

        let store = MetadataStore::new(data.path());
        let run = register_bundle(&store, extract.path(), "bundle.tar.gz").unwrap();
        assert_eq!(run.nodes, vec!["exec-1", "exec-2", "coord-1"]);
        assert_eq!(run.overall_state(), AnalysisState::NotStarted);

        // The fresh aggregate is persisted immediately.
        let loaded = store.load(&run.run_id).unwrap().unwrap();
        assert_eq!(loaded.nodes, run.nodes);
    }

    #[test]
    fn test_register_rejects_missing_summary() {
        let data = tempfile::tempdir().unwrap();
        let extract = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(data.path());
        let err = register_bundle(&store, extract.path(), "bundle.tar.gz").unwrap_err();
        assert!(matches!(err, StoreError::InvalidBundle(_)));
    }

    #[test]
    fn test_register_rejects_empty_node_list() {
        let data = tempfile::tempdir().unwrap();
        let extract = tempfile::tempdir().unwrap();
        fs::write(
            extract.path().join("summary.json"),
            r#"{"executors": [], "coordinators": []}"#,
        )
        .unwrap();
        let store = MetadataStore::new(data.path());
        let err = register_bundle(&store, extract.path(), "bundle.tar.gz").unwrap_err();
        assert!(matches!(err, StoreError::InvalidBundle(_)));
    }
}
