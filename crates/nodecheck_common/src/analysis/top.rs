//! TOP source extractor and its CPU/load rule bank.

use super::{lock, start_unit, UnitStart};
use crate::insight::{Insight, InsightQualifier};
use crate::metadata::RunMetadata;
use crate::parsers::top::{parse_cpu_line, parse_load_line};
use crate::series::{mean, CpuSeries, LoadSeries};
use crate::source::Source;
use crate::state::AnalysisState;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;
use tracing::error;

/// Analyse the periodic `top` snapshot dump for one node.
pub(crate) fn analyze_top(metadata: &Mutex<RunMetadata>, node: &str) -> AnalysisState {
    let path = match start_unit(metadata, node, Source::Top) {
        UnitStart::Run(path) => path,
        UnitStart::Done(state) => return state,
    };

    match parse_top_file(&path) {
        Ok((cpu, load)) => {
            let mut meta = lock(metadata);
            meta.record_top_facts(node, cpu, load);
            run_top_rules(&mut meta, node);
            meta.set_state(node, Source::Top, AnalysisState::Completed);
            AnalysisState::Completed
        }
        Err(err) => {
            error!(node, path = %path.display(), error = %err, "error reading ttop dump");
            let mut meta = lock(metadata);
            meta.set_state(node, Source::Top, AnalysisState::Failed);
            AnalysisState::Failed
        }
    }
}

/// Stream the dump through the line parsers into fresh collections.
/// Lines that match neither parser are simply skipped; dumps carry a
/// lot of per-process noise between snapshots.
fn parse_top_file(path: &Path) -> Result<(CpuSeries, LoadSeries)> {
    let file =
        File::open(path).with_context(|| format!("opening ttop dump {}", path.display()))?;
    let mut cpu = CpuSeries::default();
    let mut load = LoadSeries::default();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading ttop dump {}", path.display()))?;
        if !parse_load_line(&mut load, &line) {
            parse_cpu_line(&mut cpu, &line);
        }
    }
    Ok((cpu, load))
}

fn run_top_rules(meta: &mut RunMetadata, node: &str) {
    check_cpu_wa(meta, node);
    check_cpu_st(meta, node);
    check_cpu_usage(meta, node);
    check_jpdm(meta, node);
    check_load_average(meta, node);
}

/// Average time spent waiting for disk I/O.
fn check_cpu_wa(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Check,
        "Checking the average CPU time spent waiting for I/O",
    ));

    let Some(avg_wa) = meta.cpu_series(node).and_then(|s| mean(&s.wa)) else {
        return;
    };
    let insight = if avg_wa >= 6.0 {
        Insight::new(
            node,
            Source::Top,
            InsightQualifier::Bad,
            format!("High average CPU time spent waiting for disk I/O: {avg_wa:.1}%"),
        )
    } else if avg_wa >= 1.0 {
        Insight::new(
            node,
            Source::Top,
            InsightQualifier::Interesting,
            format!("Non-zero average CPU time spent waiting for disk I/O: {avg_wa:.1}%"),
        )
    } else {
        Insight::new(
            node,
            Source::Top,
            InsightQualifier::Ok,
            "No time spent waiting for disk I/O, suggesting no disk saturation",
        )
    };
    meta.add_insight(insight);
}

/// Average stolen CPU time; only non-zero theft is worth reporting.
fn check_cpu_st(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Check,
        "Checking the average stolen CPU time",
    ));

    let Some(avg_st) = meta.cpu_series(node).and_then(|s| mean(&s.st)) else {
        return;
    };
    if avg_st >= 1.0 {
        meta.add_insight(Insight::new(
            node,
            Source::Top,
            InsightQualifier::Bad,
            format!("Non-zero stolen CPU time: {avg_st:.1}%"),
        ));
    }
}

fn check_cpu_usage(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Check,
        "Checking the average CPU usage",
    ));

    let Some(avg_total) = meta.cpu_series(node).and_then(|s| mean(&s.total)) else {
        return;
    };
    if avg_total > 60.0 {
        meta.add_insight(Insight::new(
            node,
            Source::Top,
            InsightQualifier::Bad,
            format!("High average CPU usage: {avg_total:.0}%"),
        ));
    }
}

/// Classify the dominant CPU consumer from the system-to-user ratio.
/// Exactly one of the three verdicts fires once the series is non-empty.
fn check_jpdm(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Check,
        "Checking the JPDM ratio",
    ));

    let (Some(avg_jpdm), Some(avg_total)) = (
        meta.cpu_series(node).and_then(|s| mean(&s.jpdm)),
        meta.cpu_series(node).and_then(|s| mean(&s.total)),
    ) else {
        return;
    };

    let message = if avg_jpdm >= 10.0 {
        format!("Dominating consumer of the CPU: System. JPDM ratio={avg_jpdm:.1}%")
    } else if avg_total >= 90.0 {
        format!(
            "Dominating consumer of the CPU: User. JPDM ratio={avg_jpdm:.1}% and average CPU usage={avg_total:.0}%"
        )
    } else {
        format!(
            "Dominating consumer of the CPU: None. JPDM ratio={avg_jpdm:.1}% and average CPU usage={avg_total:.0}%"
        )
    };
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Interesting,
        message,
    ));
}

/// Compare sustained load against the node's CPU count. Needs the
/// OS_INFO scalar; silently not applicable until that source has run.
fn check_load_average(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::Top,
        InsightQualifier::Check,
        "Checking the load averages",
    ));

    let (Some(avg_1m), Some(avg_15m)) = (
        meta.load_series(node).and_then(|s| mean(&s.one_min)),
        meta.load_series(node).and_then(|s| mean(&s.fifteen_min)),
    ) else {
        return;
    };
    let Some(cpu_count) = meta.os_facts(node).and_then(|f| f.total_cpu_count) else {
        return;
    };

    if avg_1m > cpu_count as f64 && avg_15m > cpu_count as f64 {
        meta.add_insight(Insight::new(
            node,
            Source::Top,
            InsightQualifier::Interesting,
            format!(
                "Both 1-min load average ({avg_1m:.1}) and 15-min load average ({avg_15m:.1}) are higher than total CPU count ({cpu_count})"
            ),
        ));
    }
}
