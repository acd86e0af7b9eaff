//! The per-run metadata aggregate.
//!
//! One `RunMetadata` owns everything derived from one uploaded bundle:
//! the fixed node list, per-unit analysis states, per-node series and
//! scalars, and the global insight set. It is the single unit of
//! mutation and the single unit handed to the metadata store.

use crate::insight::{sort_for_display, Insight, InsightQualifier};
use crate::series::{CpuSeries, LoadSeries, OsFacts};
use crate::source::Source;
use crate::state::AnalysisState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique id of this diagnostics run, doubles as the store directory name.
    pub run_id: String,
    /// Name of the bundle as uploaded.
    pub original_filename: String,
    pub upload_time: DateTime<Utc>,
    /// Root the bundle was extracted into.
    pub extract_path: PathBuf,
    /// Known nodes, fixed at registration. Never grows.
    pub nodes: Vec<String>,

    analysis_state: BTreeMap<String, BTreeMap<Source, AnalysisState>>,
    cpu: BTreeMap<String, CpuSeries>,
    load: BTreeMap<String, LoadSeries>,
    os: BTreeMap<String, OsFacts>,
    insights: BTreeSet<Insight>,
}

impl RunMetadata {
    pub fn new(
        run_id: impl Into<String>,
        original_filename: impl Into<String>,
        extract_path: impl Into<PathBuf>,
        nodes: Vec<String>,
    ) -> Self {
        let mut analysis_state = BTreeMap::new();
        for node in &nodes {
            analysis_state.insert(node.clone(), fresh_states());
        }
        Self {
            run_id: run_id.into(),
            original_filename: original_filename.into(),
            upload_time: Utc::now(),
            extract_path: extract_path.into(),
            nodes,
            analysis_state,
            cpu: BTreeMap::new(),
            load: BTreeMap::new(),
            os: BTreeMap::new(),
            insights: BTreeSet::new(),
        }
    }

    pub fn is_known_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    /// State of one unit; units never touched yet read as `NotStarted`.
    pub fn state_of(&self, node: &str, source: Source) -> AnalysisState {
        self.analysis_state
            .get(node)
            .and_then(|per_source| per_source.get(&source))
            .copied()
            .unwrap_or(AnalysisState::NotStarted)
    }

    pub(crate) fn set_state(&mut self, node: &str, source: Source, state: AnalysisState) {
        self.analysis_state
            .entry(node.to_string())
            .or_default()
            .insert(source, state);
    }

    /// Atomic claim of one unit: only the caller that flips
    /// `NotStarted` to `InProgress` may do the work. Returns the
    /// current state unchanged for everyone else. Callers must hold
    /// the aggregate lock across this call.
    pub(crate) fn begin_unit(&mut self, node: &str, source: Source) -> Result<(), AnalysisState> {
        let current = self.state_of(node, source);
        if current != AnalysisState::NotStarted {
            return Err(current);
        }
        self.set_state(node, source, AnalysisState::InProgress);
        Ok(())
    }

    /// Overall run state: the reduction of every `(node, source)` unit.
    /// An empty node set reads as `NotStarted`.
    pub fn overall_state(&self) -> AnalysisState {
        let mut units = self
            .nodes
            .iter()
            .flat_map(|node| Source::ALL.into_iter().map(move |s| self.state_of(node, s)));
        match units.next() {
            None => AnalysisState::NotStarted,
            Some(first) => units.fold(first, AnalysisState::reduce),
        }
    }

    pub fn cpu_series(&self, node: &str) -> Option<&CpuSeries> {
        self.cpu.get(node)
    }

    pub fn load_series(&self, node: &str) -> Option<&LoadSeries> {
        self.load.get(node)
    }

    pub fn os_facts(&self, node: &str) -> Option<&OsFacts> {
        self.os.get(node)
    }

    pub(crate) fn record_top_facts(&mut self, node: &str, cpu: CpuSeries, load: LoadSeries) {
        self.cpu.insert(node.to_string(), cpu);
        self.load.insert(node.to_string(), load);
    }

    pub(crate) fn record_os_facts(&mut self, node: &str, facts: OsFacts) {
        self.os.insert(node.to_string(), facts);
    }

    pub(crate) fn add_insight(&mut self, insight: Insight) {
        self.insights.insert(insight);
    }

    pub fn insights(&self) -> &BTreeSet<Insight> {
        &self.insights
    }

    /// Insights grouped qualifier-first: `qualifier -> node -> insights`,
    /// each leaf sorted by `(source, message)`.
    pub fn insights_by_qualifier(
        &self,
    ) -> BTreeMap<InsightQualifier, BTreeMap<String, Vec<Insight>>> {
        let mut grouped: BTreeMap<InsightQualifier, BTreeMap<String, Vec<Insight>>> =
            BTreeMap::new();
        for insight in &self.insights {
            grouped
                .entry(insight.qualifier)
                .or_default()
                .entry(insight.node.clone())
                .or_default()
                .push(insight.clone());
        }
        for per_node in grouped.values_mut() {
            for leaf in per_node.values_mut() {
                sort_for_display(leaf);
            }
        }
        grouped
    }

    /// Insights grouped node-first: `node -> qualifier -> insights`,
    /// each leaf sorted by `(source, message)`.
    pub fn insights_by_node(&self) -> BTreeMap<String, BTreeMap<InsightQualifier, Vec<Insight>>> {
        let mut grouped: BTreeMap<String, BTreeMap<InsightQualifier, Vec<Insight>>> =
            BTreeMap::new();
        for insight in &self.insights {
            grouped
                .entry(insight.node.clone())
                .or_default()
                .entry(insight.qualifier)
                .or_default()
                .push(insight.clone());
        }
        for per_qualifier in grouped.values_mut() {
            for leaf in per_qualifier.values_mut() {
                sort_for_display(leaf);
            }
        }
        grouped
    }

    /// Clear every derived fact and put all units back to `NotStarted`,
    /// keeping identity (id, filename, extract path, node list). Used
    /// for "rerun analysis."
    pub fn reset(&mut self) {
        self.analysis_state = self
            .nodes
            .iter()
            .map(|node| (node.clone(), fresh_states()))
            .collect();
        self.cpu.clear();
        self.load.clear();
        self.os.clear();
        self.insights.clear();
    }

    /// Restart-time reconciliation: a unit persisted as `InProgress`
    /// was interrupted mid-analysis and is safe to re-run.
    pub(crate) fn reconcile_stale_units(&mut self) {
        for per_source in self.analysis_state.values_mut() {
            for state in per_source.values_mut() {
                if *state == AnalysisState::InProgress {
                    *state = AnalysisState::NotStarted;
                }
            }
        }
    }
}

fn fresh_states() -> BTreeMap<Source, AnalysisState> {
    Source::ALL
        .into_iter()
        .map(|source| (source, AnalysisState::NotStarted))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run() -> RunMetadata {
        RunMetadata::new(
            "run-1",
            "bundle.tar.gz",
            "/tmp/extracts/run-1",
            vec!["node-a".to_string(), "node-b".to_string()],
        )
    }

    #[test]
    fn test_new_run_is_not_started_everywhere() {
        let run = sample_run();
        for node in &run.nodes {
            for source in Source::ALL {
                assert_eq!(run.state_of(node, source), AnalysisState::NotStarted);
            }
        }
        assert_eq!(run.overall_state(), AnalysisState::NotStarted);
    }

    #[test]
    fn test_empty_node_set_reads_not_started() {
        let run = RunMetadata::new("run-2", "bundle.tar.gz", "/tmp/x", Vec::new());
        assert_eq!(run.overall_state(), AnalysisState::NotStarted);
    }

    #[test]
    fn test_begin_unit_claims_exactly_once() {
        let mut run = sample_run();
        assert!(run.begin_unit("node-a", Source::Top).is_ok());
        assert_eq!(
            run.begin_unit("node-a", Source::Top),
            Err(AnalysisState::InProgress)
        );
        // The other source of the same node is an independent unit.
        assert!(run.begin_unit("node-a", Source::OsInfo).is_ok());
    }

    #[test]
    fn test_overall_state_reduces_over_all_units() {
        let mut run = sample_run();
        run.set_state("node-a", Source::Top, AnalysisState::Completed);
        run.set_state("node-a", Source::OsInfo, AnalysisState::Completed);
        run.set_state("node-b", Source::Top, AnalysisState::Skipped);
        run.set_state("node-b", Source::OsInfo, AnalysisState::Completed);
        assert_eq!(run.overall_state(), AnalysisState::Completed);

        run.set_state("node-b", Source::Top, AnalysisState::Failed);
        assert_eq!(run.overall_state(), AnalysisState::Failed);
    }

    #[test]
    fn test_reset_clears_derived_state_keeps_identity() {
        let mut run = sample_run();
        run.set_state("node-a", Source::Top, AnalysisState::Failed);
        run.record_top_facts("node-a", CpuSeries::default(), LoadSeries::default());
        run.add_insight(Insight::new(
            "node-a",
            Source::Top,
            InsightQualifier::Bad,
            "something",
        ));

        run.reset();

        assert_eq!(run.run_id, "run-1");
        assert_eq!(run.nodes.len(), 2);
        assert_eq!(run.state_of("node-a", Source::Top), AnalysisState::NotStarted);
        assert!(run.cpu_series("node-a").is_none());
        assert!(run.insights().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut run = sample_run();
        run.set_state("node-a", Source::Top, AnalysisState::Completed);
        run.add_insight(Insight::new(
            "node-a",
            Source::Top,
            InsightQualifier::Ok,
            "fine",
        ));

        let json = serde_json::to_string_pretty(&run).unwrap();
        let restored: RunMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, run.run_id);
        assert_eq!(restored.state_of("node-a", Source::Top), AnalysisState::Completed);
        assert_eq!(restored.insights().len(), 1);
    }

    #[test]
    fn test_grouped_views_sort_leaves() {
        let mut run = sample_run();
        run.add_insight(Insight::new(
            "node-a",
            Source::OsInfo,
            InsightQualifier::Ok,
            "beta",
        ));
        run.add_insight(Insight::new(
            "node-a",
            Source::Top,
            InsightQualifier::Ok,
            "zeta",
        ));
        run.add_insight(Insight::new(
            "node-a",
            Source::OsInfo,
            InsightQualifier::Ok,
            "alpha",
        ));

        let by_qualifier = run.insights_by_qualifier();
        let leaf = &by_qualifier[&InsightQualifier::Ok]["node-a"];
        let messages: Vec<&str> = leaf.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["zeta", "alpha", "beta"]);

        let by_node = run.insights_by_node();
        assert_eq!(by_node["node-a"][&InsightQualifier::Ok].len(), 3);
    }
}
