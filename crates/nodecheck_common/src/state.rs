//! Per-unit analysis lifecycle states and their aggregation order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one `(node, source)` analysis unit.
///
/// Transitions within a run are monotonic: a unit never leaves
/// `Completed`/`Failed`/`Skipped` except through a whole-aggregate
/// [`reset`](crate::metadata::RunMetadata::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl AnalysisState {
    /// Aggregation rank. This is an explicit table, not declaration order:
    /// FAILED > IN_PROGRESS > COMPLETED > SKIPPED > NOT_STARTED.
    fn rank(self) -> u8 {
        match self {
            AnalysisState::Failed => 4,
            AnalysisState::InProgress => 3,
            AnalysisState::Completed => 2,
            AnalysisState::Skipped => 1,
            AnalysisState::NotStarted => 0,
        }
    }

    /// Reduce two unit states into the one that dominates a summary view.
    pub fn reduce(self, other: AnalysisState) -> AnalysisState {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::NotStarted => "not_started",
            AnalysisState::InProgress => "in_progress",
            AnalysisState::Completed => "completed",
            AnalysisState::Failed => "failed",
            AnalysisState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}
