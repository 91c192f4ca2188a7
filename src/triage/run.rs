//! One analysis run: fetch the open issues, analyze them batch by batch and
//! publish everything to the store.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{json, Value};

use super::merge::fallback_issue;
use super::poll::{poll_session, PollPolicy, PollTarget};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::ports::issues::RawIssue;
use crate::ports::sessions::CreateSessionRequest;
use crate::store::{AnalysisSessionRef, RunStatus, TriageStore};

/// Characters of each issue body included in the analysis prompt.
const PROMPT_BODY_CHARS: usize = 500;

/// Knobs for a run, usually taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Repository named in the prompt.
    pub repo: String,
    /// Cap on fetched issues.
    pub max_issues: usize,
    /// Issues per session; 0 sends every issue to one session.
    pub batch_size: usize,
    /// How each session is polled.
    pub policy: PollPolicy,
}

impl RunOptions {
    /// Derives run options from the process settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            repo: settings.repo.to_string(),
            max_issues: settings.max_issues,
            batch_size: settings.batch_size,
            policy: PollPolicy {
                max_attempts: settings.poll_attempts,
                interval: settings.poll_interval,
                ..PollPolicy::default()
            },
        }
    }
}

/// Starts a run in the background unless one is already active.
///
/// Returns false, without spawning anything, when a run is in flight.
/// Failures of the spawned run only show up in the store's status.
pub fn spawn_analysis(ctx: Arc<ServiceContext>, store: Arc<TriageStore>, opts: RunOptions) -> bool {
    if !store.begin_run() {
        return false;
    }
    let run_store = Arc::clone(&store);
    let run = tokio::spawn(async move {
        if let Err(e) = run_analysis(&ctx, &run_store, &opts).await {
            tracing::error!(error = %e, "analysis run failed");
        }
    });
    // A panicking run must not leave the store stuck in an active status.
    tokio::spawn(async move {
        if let Err(e) = run.await {
            tracing::error!(error = %e, "analysis run aborted");
            store.set_status(RunStatus::Error, Some(format!("Analysis run aborted: {e}")));
        }
    });
    true
}

/// Runs the analysis to completion.
///
/// The caller is expected to have admitted the run with
/// [`TriageStore::begin_run`]. Returns the number of stored issues.
///
/// # Errors
///
/// Returns an error if the issues cannot be fetched; the store's status
/// is set to `error` with the same message.
pub async fn run_analysis(
    ctx: &ServiceContext,
    store: &TriageStore,
    opts: &RunOptions,
) -> Result<usize, String> {
    store.set_status(RunStatus::Fetching, None);
    tracing::info!(repo = %opts.repo, max = opts.max_issues, "fetching open issues");

    let issues = match ctx.issues.list_open(opts.max_issues).await {
        Ok(issues) => issues,
        Err(e) => {
            let message = format!("Failed to fetch issues: {e}");
            store.set_status(RunStatus::Error, Some(message.clone()));
            return Err(message);
        }
    };

    let total = issues.len();
    store.set_status(RunStatus::Analyzing, None);
    store.set_progress(0, total, None);

    let batch_size = if opts.batch_size == 0 { total.max(1) } else { opts.batch_size };
    let batches: Vec<&[RawIssue]> = issues.chunks(batch_size).collect();
    let mut completed = 0;

    for (index, batch) in batches.iter().enumerate() {
        let label = format!("batch {}/{}", index + 1, batches.len());
        store.set_progress(completed, total, Some(label.clone()));
        let plan = Batch { index, issues: batch, completed_before: completed, total, label: &label };
        analyze_batch(ctx, store, opts, &plan).await;

        let added = store.add_issues(
            batch
                .iter()
                .filter(|issue| store.issue(issue.number).is_none())
                .map(fallback_issue)
                .collect(),
        );
        if added > 0 {
            tracing::info!(batch = index, fallbacks = added, "filled unanalyzed issues with defaults");
        }
        completed += batch.len();
        store.set_progress(completed, total, Some(label));
    }

    store.set_progress(completed, total, None);
    store.set_status(RunStatus::Complete, None);
    let stored = store.issues().len();
    tracing::info!(issues = stored, "analysis run complete");
    Ok(stored)
}

/// One slice of the run's issues, analyzed by a single session.
struct Batch<'a> {
    index: usize,
    issues: &'a [RawIssue],
    completed_before: usize,
    total: usize,
    label: &'a str,
}

async fn analyze_batch(ctx: &ServiceContext, store: &TriageStore, opts: &RunOptions, batch: &Batch<'_>) {
    let index = batch.index;
    let request = CreateSessionRequest {
        prompt: analysis_prompt(&opts.repo, batch.issues),
        structured_output_schema: Some(analysis_schema()),
        idempotent: None,
    };
    let handle = match ctx.sessions.create(&request).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(batch = index, error = %e, "could not create analysis session");
            return;
        }
    };
    tracing::info!(batch = index, session_id = %handle.session_id, url = %handle.url, "analysis session created");

    store.register_session(
        format!("batch-{index}"),
        AnalysisSessionRef {
            session_id: handle.session_id.clone(),
            batch_index: index,
            issue_numbers: batch.issues.iter().map(|i| i.number).collect(),
        },
    );

    let target = PollTarget {
        session_id: &handle.session_id,
        originals: batch.issues,
        completed_before: batch.completed_before,
        total: batch.total,
        label: batch.label,
    };
    poll_session(ctx, store, target, &opts.policy).await;
}

/// Builds the prompt asking for a classification of every issue in `batch`.
#[must_use]
pub fn analysis_prompt(repo: &str, batch: &[RawIssue]) -> String {
    let mut prompt = format!(
        "You are triaging open GitHub issues from the {repo} repository. \
         Classify every issue listed below and keep your structured output \
         updated as you go, adding each issue as soon as you finish it.\n\n\
         For each issue report:\n\
         - number: the issue number\n\
         - summary: a 1-2 sentence description\n\
         - priority: critical, high, medium or low\n\
         - difficulty: easy, medium, hard or expert\n\
         - feature: a short area label such as api, ui, documentation, testing or infrastructure\n\
         - stale: true if the issue looks outdated, duplicated, won't be fixed, \
         cannot be reproduced or is already resolved\n\
         - staleReason: outdated, duplicate, wont-fix, not-reproducible, already-resolved or null\n\
         - hasPR: true if a pull request already addresses the issue\n\
         - startingPoint: where a developer should start looking, or null\n\n\
         Issues ({}):\n",
        batch.len()
    );

    for issue in batch {
        let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
        let labels = if labels.is_empty() { "none".to_string() } else { labels.join(", ") };
        let body: String = issue
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or("No description")
            .chars()
            .take(PROMPT_BODY_CHARS)
            .collect();
        let _ = write!(
            prompt,
            "\n#{}: \"{}\"\nLabels: {labels}\nComments: {}\nCreated: {}\nBody: {body}\n",
            issue.number,
            issue.title,
            issue.comments,
            issue.created_at.to_rfc3339(),
        );
    }
    prompt
}

/// JSON schema attached to analysis sessions.
#[must_use]
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "number": {"type": "integer"},
                        "summary": {"type": "string"},
                        "priority": {"type": "string", "enum": ["critical", "high", "medium", "low"]},
                        "difficulty": {"type": "string", "enum": ["easy", "medium", "hard", "expert"]},
                        "feature": {"type": "string"},
                        "stale": {"type": "boolean"},
                        "staleReason": {
                            "type": ["string", "null"],
                            "enum": ["outdated", "duplicate", "wont-fix", "not-reproducible", "already-resolved", null]
                        },
                        "hasPR": {"type": "boolean"},
                        "startingPoint": {"type": ["string", "null"]}
                    },
                    "required": ["number", "summary", "priority", "difficulty", "feature", "stale"]
                }
            }
        },
        "required": ["issues"]
    })
}
