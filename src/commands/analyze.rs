//! `triage analyze` command.

use std::fmt::Write as _;
use std::path::Path;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::store::TriageStore;
use crate::triage::model::AnalyzedIssue;
use crate::triage::run::{run_analysis, RunOptions};

/// Execute the `analyze` command.
///
/// Runs one analysis to completion, against the live services or a
/// replayed cassette, and prints the issues sorted by priority.
///
/// # Errors
///
/// Returns an error string if the credential is missing for a live run,
/// the cassette cannot be loaded, or the issues cannot be fetched.
pub async fn run(settings: &Settings, replay: Option<&Path>) -> Result<(), String> {
    let ctx = match replay {
        Some(path) => ServiceContext::replaying(path)?,
        None => {
            if settings.analysis_api_key.is_none() {
                return Err("ANALYSIS_API_KEY not configured".to_string());
            }
            ServiceContext::from_settings(settings)
        }
    };

    let store = TriageStore::new();
    store.begin_run();
    run_analysis(&ctx, &store, &RunOptions::from_settings(settings)).await?;

    let issues = store.issues();
    if issues.is_empty() {
        println!("No open issues found.");
        return Ok(());
    }
    print!("{}", render_table(&issues));
    Ok(())
}

/// Renders issues as a fixed-width table sorted by priority.
#[must_use]
pub fn render_table(issues: &[AnalyzedIssue]) -> String {
    let mut sorted: Vec<&AnalyzedIssue> = issues.iter().collect();
    sorted.sort_by_key(|i| i.priority);

    // Collect rows for column-width calculation.
    let rows: Vec<[String; 6]> = sorted
        .iter()
        .map(|i| {
            [
                format!("#{}", i.number),
                i.priority.as_str().to_string(),
                i.difficulty.as_str().to_string(),
                i.feature.clone(),
                if i.stale { "yes".into() } else { String::new() },
                i.title.clone(),
            ]
        })
        .collect();

    let headers = ["NUMBER", "PRIORITY", "DIFFICULTY", "FEATURE", "STALE", "TITLE"];
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter().map(|r| r[col].chars().count()).max().unwrap_or(0).max(header.len())
        })
        .collect();

    let mut out = String::new();
    let line = |out: &mut String, cells: &[&str]| {
        let padded: Vec<String> =
            cells.iter().zip(&widths).map(|(cell, width)| format!("{cell:<width$}")).collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    line(&mut out, &headers[..]);
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(&mut out, &rules.iter().map(String::as_str).collect::<Vec<_>>());
    for row in &rows {
        line(&mut out, &row.iter().map(String::as_str).collect::<Vec<_>>());
    }

    let _ = writeln!(out, "\n{} issue(s) total.", rows.len());
    out
}
