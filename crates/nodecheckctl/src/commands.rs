//! Subcommand implementations.

use anyhow::{anyhow, Result};
use nodecheck_common::analysis;
use nodecheck_common::bootstrap::register_bundle;
use nodecheck_common::insight::InsightQualifier;
use nodecheck_common::metadata::RunMetadata;
use nodecheck_common::source::Source;
use nodecheck_common::state::AnalysisState;
use nodecheck_common::store::MetadataStore;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Mutex;

pub fn register(store: &MetadataStore, extract_dir: PathBuf, name: Option<String>) -> Result<()> {
    let bundle_name = name.unwrap_or_else(|| {
        extract_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string())
    });
    let run = register_bundle(store, &extract_dir, &bundle_name)?;
    println!("Registered run {}", run.run_id.bold());
    println!("  bundle: {}", run.original_filename);
    println!("  nodes:  {}", run.nodes.join(", "));
    Ok(())
}

pub fn analyze(store: &MetadataStore, run_id: &str) -> Result<()> {
    let run = Mutex::new(load_run(store, run_id)?);
    let overall = analysis::analyze_all(store, &run);

    let run = run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    println!("Run {}", run.run_id.bold());
    for node in &run.nodes {
        for source in Source::ALL {
            println!(
                "  {:<24} {:<8} {}",
                node,
                source.to_string(),
                paint_state(run.state_of(node, source))
            );
        }
    }
    println!("Overall: {}", paint_state(overall));
    Ok(())
}

pub fn report(store: &MetadataStore, run_id: &str, all: bool) -> Result<()> {
    let run = load_run(store, run_id)?;
    let grouped = run.insights_by_qualifier();

    println!("Insights for {} ({})", run.original_filename, run.run_id);
    for qualifier in InsightQualifier::DISPLAY_ORDER {
        if !all
            && matches!(
                qualifier,
                InsightQualifier::Check | InsightQualifier::Debug
            )
        {
            continue;
        }
        let Some(per_node) = grouped.get(&qualifier) else {
            continue;
        };
        println!("\n[{}]", paint_qualifier(qualifier));
        for (node, insights) in per_node {
            println!("  {}", node.bold());
            for insight in insights {
                println!("    [{}] {}", insight.source, insight.message);
            }
        }
    }
    Ok(())
}

pub fn list(store: &MetadataStore) -> Result<()> {
    let runs = store.list()?;
    if runs.is_empty() {
        println!("No registered runs.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {}  {} nodes  {}  {}",
            run.run_id,
            run.upload_time.format("%Y-%m-%d %H:%M:%S"),
            run.nodes.len(),
            paint_state(run.overall_state()),
            run.original_filename,
        );
    }
    Ok(())
}

pub fn reset(store: &MetadataStore, run_id: &str) -> Result<()> {
    let mut run = load_run(store, run_id)?;
    run.reset();
    store.save(&run)?;
    println!("Reset run {}", run.run_id.bold());
    Ok(())
}

fn load_run(store: &MetadataStore, run_id: &str) -> Result<RunMetadata> {
    store
        .load(run_id)?
        .ok_or_else(|| anyhow!("no run with id {run_id}"))
}

fn paint_state(state: AnalysisState) -> String {
    match state {
        AnalysisState::Completed => state.to_string().green().to_string(),
        AnalysisState::Failed => state.to_string().red().to_string(),
        AnalysisState::Skipped => state.to_string().yellow().to_string(),
        AnalysisState::InProgress => state.to_string().cyan().to_string(),
        AnalysisState::NotStarted => state.to_string().dimmed().to_string(),
    }
}

fn paint_qualifier(qualifier: InsightQualifier) -> String {
    match qualifier {
        InsightQualifier::Bad => qualifier.to_string().red().to_string(),
        InsightQualifier::Interesting => qualifier.to_string().yellow().to_string(),
        InsightQualifier::Ok => qualifier.to_string().green().to_string(),
        InsightQualifier::Check | InsightQualifier::Debug => {
            qualifier.to_string().dimmed().to_string()
        }
    }
}
