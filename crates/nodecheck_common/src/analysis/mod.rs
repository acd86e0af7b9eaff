//! Analysis drivers.
//!
//! One `(node, source)` pair is one unit of work: claim it, locate its
//! dump, parse, commit facts, run that source's rules, finalize the
//! state. Units are independently idempotent and every failure is
//! contained at the unit boundary; nothing in here returns an error to
//! the caller.

mod osinfo;
mod top;

use crate::locate::{locate_source_file, Located};
use crate::metadata::RunMetadata;
use crate::source::Source;
use crate::state::AnalysisState;
use crate::store::MetadataStore;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Run one analysis unit and persist the aggregate afterwards, success
/// or not, so partial progress survives a crash between units.
pub fn analyze(
    store: &MetadataStore,
    metadata: &Mutex<RunMetadata>,
    node: &str,
    source: Source,
) -> AnalysisState {
    let state = match source {
        Source::Top => top::analyze_top(metadata, node),
        Source::OsInfo => osinfo::analyze_os_info(metadata, node),
    };

    let guard = lock(metadata);
    if let Err(err) = store.save(&guard) {
        warn!(run_id = %guard.run_id, error = %err, "could not persist metadata snapshot");
    }
    state
}

/// Visit every `(node, source)` unit. Units are attempted
/// independently; one failure never stops the sweep. Returns the
/// reduced overall run state.
pub fn analyze_all(store: &MetadataStore, metadata: &Mutex<RunMetadata>) -> AnalysisState {
    let nodes = lock(metadata).nodes.clone();
    for node in &nodes {
        for source in Source::ALL {
            analyze(store, metadata, node, source);
        }
    }
    lock(metadata).overall_state()
}

/// Reclaim the aggregate lock even if a previous holder panicked. Facts
/// commit atomically under the lock, so a poisoned guard holds no
/// half-written series.
pub(crate) fn lock(metadata: &Mutex<RunMetadata>) -> MutexGuard<'_, RunMetadata> {
    metadata.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a unit may proceed after the claim-and-locate preamble.
pub(crate) enum UnitStart {
    /// Claimed; parse this file.
    Run(PathBuf),
    /// Nothing to do; the unit already holds this state.
    Done(AnalysisState),
}

/// Shared preamble for every source extractor.
///
/// Holds the aggregate lock across the known-node check and the
/// `NotStarted` -> `InProgress` transition, so two concurrent callers
/// can never both claim the same unit. File lookup then happens
/// outside the lock; the `InProgress` claim keeps other callers away.
pub(crate) fn start_unit(
    metadata: &Mutex<RunMetadata>,
    node: &str,
    source: Source,
) -> UnitStart {
    let extract_root = {
        let mut meta = lock(metadata);
        if !meta.is_known_node(node) {
            error!(node, %source, known = ?meta.nodes, "node not present in run metadata");
            meta.set_state(node, source, AnalysisState::Skipped);
            return UnitStart::Done(AnalysisState::Skipped);
        }
        match meta.begin_unit(node, source) {
            Ok(()) => meta.extract_path.clone(),
            Err(current) => {
                debug!(node, %source, state = %current, "analysis already attempted, skipping");
                return UnitStart::Done(current);
            }
        }
    };

    match locate_source_file(&extract_root, source, node) {
        Located::File(path) => UnitStart::Run(path),
        Located::Missing => {
            error!(
                node,
                %source,
                root = %extract_root.display(),
                "could not find {} for node",
                source.file_name()
            );
            finish(metadata, node, source, AnalysisState::Skipped)
        }
        Located::NotAFile(path) => {
            error!(node, %source, path = %path.display(), "found path is not a file");
            finish(metadata, node, source, AnalysisState::Skipped)
        }
        Located::Ambiguous(candidates) => {
            error!(node, %source, ?candidates, "ambiguous source: multiple captures match");
            finish(metadata, node, source, AnalysisState::Skipped)
        }
    }
}

fn finish(
    metadata: &Mutex<RunMetadata>,
    node: &str,
    source: Source,
    state: AnalysisState,
) -> UnitStart {
    lock(metadata).set_state(node, source, state);
    UnitStart::Done(state)
}
