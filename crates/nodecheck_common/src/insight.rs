//! Qualified observations produced by the rule bank.

use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity/category label on an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightQualifier {
    /// Nothing wrong; worth stating in a report.
    Ok,
    /// Worth a closer look, not necessarily a problem.
    Interesting,
    /// A problem.
    Bad,
    /// Audit record that a rule was evaluated, independent of verdict.
    Check,
    /// Internal diagnostics, hidden from the default report.
    Debug,
}

impl InsightQualifier {
    /// Order used when rendering grouped views, most urgent first.
    /// Display concern only; map ordering elsewhere uses `Ord`.
    pub const DISPLAY_ORDER: [InsightQualifier; 5] = [
        InsightQualifier::Bad,
        InsightQualifier::Interesting,
        InsightQualifier::Ok,
        InsightQualifier::Check,
        InsightQualifier::Debug,
    ];
}

impl fmt::Display for InsightQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsightQualifier::Ok => "ok",
            InsightQualifier::Interesting => "interesting",
            InsightQualifier::Bad => "bad",
            InsightQualifier::Check => "check",
            InsightQualifier::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// One qualified, human-readable observation about a node.
///
/// Identity is structural over all four fields. The aggregate keeps
/// insights in a set keyed by that identity, so re-running a rule can
/// never produce a duplicate entry for the same fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Insight {
    pub node: String,
    pub source: Source,
    pub qualifier: InsightQualifier,
    pub message: String,
}

impl Insight {
    pub fn new(
        node: &str,
        source: Source,
        qualifier: InsightQualifier,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node: node.to_string(),
            source,
            qualifier,
            message: message.into(),
        }
    }
}

/// Sort a leaf list of a grouped view for deterministic display.
pub(crate) fn sort_for_display(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_structural() {
        let a = Insight::new("node-1", Source::Top, InsightQualifier::Ok, "fine");
        let b = Insight::new("node-1", Source::Top, InsightQualifier::Ok, "fine");
        let c = Insight::new("node-1", Source::Top, InsightQualifier::Bad, "fine");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = std::collections::BTreeSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_sort_is_source_then_message() {
        let mut leaf = vec![
            Insight::new("n", Source::OsInfo, InsightQualifier::Ok, "b"),
            Insight::new("n", Source::Top, InsightQualifier::Ok, "z"),
            Insight::new("n", Source::OsInfo, InsightQualifier::Ok, "a"),
        ];
        sort_for_display(&mut leaf);
        let order: Vec<(Source, &str)> = leaf
            .iter()
            .map(|i| (i.source, i.message.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Source::Top, "z"),
                (Source::OsInfo, "a"),
                (Source::OsInfo, "b"),
            ]
        );
    }
}
