//! OS_INFO source extractor and its rule bank.

use super::{lock, start_unit, UnitStart};
use crate::insight::{Insight, InsightQualifier};
use crate::metadata::RunMetadata;
use crate::parsers::osinfo::{
    expand_cpu_ranges, parse_online_cpu_list, parse_total_cpu_count, parse_total_memory_kb,
};
use crate::series::OsFacts;
use crate::source::Source;
use crate::state::AnalysisState;
use std::fs;
use std::sync::Mutex;
use tracing::{error, warn};

/// Analyse the one-shot OS facts dump for one node.
pub(crate) fn analyze_os_info(metadata: &Mutex<RunMetadata>, node: &str) -> AnalysisState {
    let path = match start_unit(metadata, node, Source::OsInfo) {
        UnitStart::Run(path) => path,
        UnitStart::Done(state) => return state,
    };

    match fs::read_to_string(&path) {
        Ok(content) => {
            let facts = extract_os_facts(node, &content);
            let mut meta = lock(metadata);
            meta.record_os_facts(node, facts);
            run_os_info_rules(&mut meta, node);
            meta.set_state(node, Source::OsInfo, AnalysisState::Completed);
            AnalysisState::Completed
        }
        Err(err) => {
            error!(node, path = %path.display(), error = %err, "error reading os_info dump");
            let mut meta = lock(metadata);
            meta.set_state(node, Source::OsInfo, AnalysisState::Failed);
            AnalysisState::Failed
        }
    }
}

/// Pull the scalars out of the dump. Missing sections stay `None`; an
/// unparseable on-line list downgrades to "no online-CPU fact" with a
/// warning rather than failing the unit.
fn extract_os_facts(node: &str, content: &str) -> OsFacts {
    let mut facts = OsFacts {
        total_memory_kb: parse_total_memory_kb(content),
        total_cpu_count: parse_total_cpu_count(content),
        ..OsFacts::default()
    };
    if let Some(expr) = parse_online_cpu_list(content) {
        facts.online_cpu_list = Some(expr.to_string());
        match expand_cpu_ranges(expr) {
            Ok(cpus) => facts.online_cpu_count = Some(cpus.len() as u64),
            Err(err) => warn!(node, expr, error = %err, "unparseable on-line CPU list"),
        }
    }
    facts
}

fn run_os_info_rules(meta: &mut RunMetadata, node: &str) {
    check_total_memory(meta, node);
    check_cpu_count(meta, node);
    check_online_cpus(meta, node);
}

fn check_total_memory(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::OsInfo,
        InsightQualifier::Check,
        "Checking the total memory",
    ));

    let Some(memory_kb) = meta.os_facts(node).and_then(|f| f.total_memory_kb) else {
        return;
    };
    let memory_gib = memory_kb as f64 / 1024.0 / 1024.0;
    meta.add_insight(Insight::new(
        node,
        Source::OsInfo,
        InsightQualifier::Ok,
        format!("The server has {memory_gib:.1} GiB RAM."),
    ));
}

fn check_cpu_count(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::OsInfo,
        InsightQualifier::Check,
        "Checking the total CPU count",
    ));

    let Some(cpu_count) = meta.os_facts(node).and_then(|f| f.total_cpu_count) else {
        return;
    };
    meta.add_insight(Insight::new(
        node,
        Source::OsInfo,
        InsightQualifier::Ok,
        format!("The server has {cpu_count} CPU cores."),
    ));
}

/// Flag nodes where some of the installed CPUs are offline.
fn check_online_cpus(meta: &mut RunMetadata, node: &str) {
    meta.add_insight(Insight::new(
        node,
        Source::OsInfo,
        InsightQualifier::Check,
        "Checking that all CPUs are online",
    ));

    let Some((total, online, expr)) = meta.os_facts(node).and_then(|f| {
        Some((
            f.total_cpu_count?,
            f.online_cpu_count?,
            f.online_cpu_list.clone()?,
        ))
    }) else {
        return;
    };

    if total != online {
        meta.add_insight(Insight::new(
            node,
            Source::OsInfo,
            InsightQualifier::Interesting,
            format!(
                "There are {total} CPUs in total but they are not all enabled, only {online} of them are online ({expr})."
            ),
        ));
    }
}
