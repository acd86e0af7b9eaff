//! On-disk persistence of run metadata snapshots.
//!
//! One directory per run under the store root, one pretty-printed JSON
//! snapshot per run. The snapshot is rewritten after every analysis
//! unit, so writes go through a temp file and a rename: a crash
//! mid-save leaves the previous snapshot intact, never a truncated one.

use crate::metadata::RunMetadata;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// File name of the snapshot inside a run's directory.
pub const METADATA_FILE: &str = "nodecheck-metadata.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}

/// Filesystem-backed store for run metadata snapshots.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    pub fn save(&self, metadata: &RunMetadata) -> Result<(), StoreError> {
        let dir = self.run_dir(&metadata.run_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(METADATA_FILE);
        let tmp = dir.join(format!("{METADATA_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(metadata)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load one run's snapshot. `Ok(None)` when the run is unknown.
    ///
    /// Units persisted as `in_progress` were interrupted mid-analysis
    /// by a crash; they are reconciled back to `not_started` here so a
    /// restart can re-run them.
    pub fn load(&self, run_id: &str) -> Result<Option<RunMetadata>, StoreError> {
        let path = self.run_dir(run_id).join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let mut metadata: RunMetadata = serde_json::from_str(&fs::read_to_string(path)?)?;
        metadata.reconcile_stale_units();
        Ok(Some(metadata))
    }

    /// All known runs, newest upload first. Directories without a
    /// readable snapshot are skipped with a warning.
    pub fn list(&self) -> Result<Vec<RunMetadata>, StoreError> {
        let mut runs = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(runs),
            Err(err) => return Err(err.into()),
        };
        for entry in entries.flatten() {
            let run_id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&run_id) {
                Ok(Some(metadata)) => runs.push(metadata),
                Ok(None) => {}
                Err(err) => {
                    warn!(%run_id, error = %err, "skipping unreadable run snapshot");
                }
            }
        }
        runs.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use crate::state::AnalysisState;

    fn sample_run(id: &str) -> RunMetadata {
        RunMetadata::new(
            id,
            "bundle.tar.gz",
            "/tmp/extracts/x",
            vec!["node-a".to_string()],
        )
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let mut run = sample_run("run-1");
        run.set_state("node-a", Source::Top, AnalysisState::Completed);

        store.save(&run).unwrap();
        let loaded = store.load("run-1").unwrap().unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(
            loaded.state_of("node-a", Source::Top),
            AnalysisState::Completed
        );
    }

    #[test]
    fn test_load_unknown_run_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_load_reconciles_stale_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let mut run = sample_run("run-1");
        run.set_state("node-a", Source::Top, AnalysisState::InProgress);
        run.set_state("node-a", Source::OsInfo, AnalysisState::Failed);
        store.save(&run).unwrap();

        let loaded = store.load("run-1").unwrap().unwrap();
        assert_eq!(
            loaded.state_of("node-a", Source::Top),
            AnalysisState::NotStarted
        );
        // Terminal states are left alone.
        assert_eq!(
            loaded.state_of("node-a", Source::OsInfo),
            AnalysisState::Failed
        );
    }

    #[test]
    fn test_list_returns_known_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample_run("run-1")).unwrap();
        store.save(&sample_run("run-2")).unwrap();
        // A stray directory without a snapshot is ignored.
        fs::create_dir_all(dir.path().join("not-a-run")).unwrap();

        let runs = store.list().unwrap();
        let mut ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["run-1", "run-2"]);
    }

    #[test]
    fn test_list_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("never-created"));
        assert!(store.list().unwrap().is_empty());
    }
}
