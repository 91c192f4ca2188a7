//! Polls one analysis session until it finishes or the attempt budget runs out.

use std::collections::HashSet;
use std::time::Duration;

use super::extract::SessionOutput;
use super::merge::merge_records;
use super::model::{AnalysisRecord, AnalyzedIssue};
use crate::context::ServiceContext;
use crate::ports::issues::RawIssue;
use crate::ports::sessions::SessionDetail;
use crate::store::TriageStore;

/// How a session is polled.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Detail fetches before giving up.
    pub max_attempts: u32,
    /// Sleep before each fetch.
    pub interval: Duration,
    /// Decides when the session will produce no further output.
    pub terminal: fn(&SessionDetail) -> bool,
    /// Decides when a partial record is worth publishing.
    pub complete: fn(&AnalysisRecord) -> bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            interval: Duration::from_secs(10),
            terminal: SessionDetail::is_terminal,
            complete: AnalysisRecord::is_complete,
        }
    }
}

/// The session being polled and where it sits in the overall run.
#[derive(Debug, Clone, Copy)]
pub struct PollTarget<'a> {
    /// Remote session id.
    pub session_id: &'a str,
    /// Issues sent to this session.
    pub originals: &'a [RawIssue],
    /// Issues completed by earlier sessions of the run.
    pub completed_before: usize,
    /// Issues in the whole run.
    pub total: usize,
    /// Progress label shown while this session runs.
    pub label: &'a str,
}

/// Polls `target` and publishes results to `store` as they arrive.
///
/// Returns the merged final payload on a terminal status (possibly empty),
/// or whatever the store holds for this session's issues once the attempts
/// are exhausted. Transport failures are logged and the next attempt runs.
pub async fn poll_session(
    ctx: &ServiceContext,
    store: &TriageStore,
    target: PollTarget<'_>,
    policy: &PollPolicy,
) -> Vec<AnalyzedIssue> {
    let mut last_count = 0;
    let mut published = 0;

    for attempt in 1..=policy.max_attempts {
        ctx.clock.sleep(policy.interval).await;

        let detail = match ctx.sessions.detail(target.session_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(session_id = target.session_id, attempt, error = %e, "session poll failed");
                continue;
            }
        };

        match SessionOutput::classify(&detail, policy.terminal) {
            SessionOutput::Pending => {
                tracing::debug!(session_id = target.session_id, attempt, status = %detail.status, "no output yet");
            }
            SessionOutput::Malformed => {
                tracing::debug!(session_id = target.session_id, attempt, "unreadable session output");
            }
            SessionOutput::Partial(records) => {
                let complete: Vec<AnalysisRecord> =
                    records.into_iter().filter(|r| (policy.complete)(r)).collect();
                if complete.len() > last_count {
                    last_count = complete.len();
                    let merged = merge_records(&complete, target.originals);
                    published = published.max(merged.len());
                    store.set_progress(
                        target.completed_before + published,
                        target.total,
                        Some(target.label.to_string()),
                    );
                    let added = store.add_issues(merged);
                    tracing::info!(session_id = target.session_id, attempt, completed = last_count, added, "partial results");
                }
            }
            SessionOutput::Terminal(records) => {
                let complete: Vec<AnalysisRecord> =
                    records.iter().filter(|r| (policy.complete)(r)).cloned().collect();
                published = published.max(merge_records(&complete, target.originals).len());
                let merged = merge_records(&records, target.originals);
                store.add_issues(merged.clone());
                store.set_progress(
                    target.completed_before + published,
                    target.total,
                    Some(target.label.to_string()),
                );
                tracing::info!(
                    session_id = target.session_id,
                    attempt,
                    status = %detail.status,
                    analyzed = merged.len(),
                    "session finished"
                );
                return merged;
            }
        }
    }

    tracing::warn!(
        session_id = target.session_id,
        attempts = policy.max_attempts,
        "session did not finish in time"
    );
    let numbers: HashSet<u64> = target.originals.iter().map(|i| i.number).collect();
    store.issues().into_iter().filter(|i| numbers.contains(&i.number)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use crate::ports::issues::Label;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn raw(number: u64) -> RawIssue {
        RawIssue {
            number,
            title: format!("Issue {number}"),
            body: Some(format!("Body of issue {number}")),
            labels: vec![Label { name: "bug".into(), color: String::new() }],
            created_at: "2024-03-01T00:00:00Z".parse().unwrap(),
            comments: 0,
            html_url: String::new(),
        }
    }

    fn detail_output(status: &str, output: Option<Value>) -> Value {
        json!({"ok": {"session_id": "s-1", "status": status, "url": "", "structured_output": output}})
    }

    fn context(name: &str, outputs: Vec<Value>) -> (ServiceContext, PathBuf) {
        let dir = std::env::temp_dir().join(format!("triage_poll_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("poll.cassette.yaml");
        let interactions = outputs
            .into_iter()
            .enumerate()
            .map(|(seq, output)| Interaction {
                seq: u64::try_from(seq).unwrap(),
                port: "sessions".into(),
                method: "detail".into(),
                input: json!({"session_id": "s-1"}),
                output,
            })
            .collect();
        let cassette =
            Cassette { name: name.into(), recorded_at: Utc::now(), repo: "acme/widgets".into(), interactions };
        std::fs::write(&path, serde_yaml::to_string(&cassette).unwrap()).unwrap();
        (ServiceContext::replaying(&path).unwrap(), dir)
    }

    fn target<'a>(originals: &'a [RawIssue]) -> PollTarget<'a> {
        PollTarget { session_id: "s-1", originals, completed_before: 0, total: originals.len(), label: "batch 1/1" }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy { max_attempts, interval: Duration::from_millis(1), ..PollPolicy::default() }
    }

    #[tokio::test]
    async fn publishes_partials_then_returns_final_payload() {
        let originals = vec![raw(1), raw(2), raw(3)];
        let (ctx, dir) = context(
            "partials",
            vec![
                detail_output("running", None),
                json!({"err": "connection reset"}),
                detail_output(
                    "running",
                    Some(json!({"issues": [
                        {"number": 1, "summary": "one", "feature": "api"},
                        {"number": 2, "summary": "two"}
                    ]})),
                ),
                detail_output(
                    "exit",
                    Some(json!({"issues": [
                        {"number": 1, "summary": "one", "feature": "api"},
                        {"number": 2, "summary": "two", "feature": "ui"}
                    ]})),
                ),
            ],
        );
        let store = TriageStore::new();

        let result = poll_session(&ctx, &store, target(&originals), &policy(10)).await;

        assert_eq!(result.len(), 2);
        let stored = store.issues();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].number, 1);
        assert_eq!(store.issue(2).unwrap().feature, "ui");
        assert_eq!(store.snapshot().progress.completed, 2);

        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn progress_never_moves_backwards_on_a_thinner_final_payload() {
        let originals = vec![raw(1), raw(2), raw(3)];
        let (ctx, dir) = context(
            "thinner_final",
            vec![
                detail_output(
                    "running",
                    Some(json!({"issues": [
                        {"number": 1, "summary": "one", "feature": "api"},
                        {"number": 2, "summary": "two", "feature": "ui"}
                    ]})),
                ),
                detail_output(
                    "exit",
                    Some(json!({"issues": [{"number": 1, "summary": "one", "feature": "api"}]})),
                ),
            ],
        );
        let store = TriageStore::new();

        poll_session(&ctx, &store, target(&originals), &policy(5)).await;

        assert_eq!(store.snapshot().progress.completed, 2);
        assert_eq!(store.issue(2).unwrap().feature, "ui");

        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn terminal_without_payload_returns_empty() {
        let originals = vec![raw(1)];
        let (ctx, dir) = context("empty", vec![detail_output("suspended", None)]);
        let store = TriageStore::new();

        let result = poll_session(&ctx, &store, target(&originals), &policy(5)).await;

        assert!(result.is_empty());
        assert!(store.issues().is_empty());

        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_stored_issues_for_this_session() {
        let originals = vec![raw(1), raw(2)];
        let (ctx, dir) = context(
            "timeout",
            vec![
                detail_output(
                    "running",
                    Some(json!({"issues": [{"number": 2, "summary": "two", "feature": "api"}]})),
                ),
                detail_output("running", Some(json!({"result": "thinking"}))),
            ],
        );
        let store = TriageStore::new();
        store.add_issues(vec![crate::triage::merge::fallback_issue(&raw(9))]);

        let result = poll_session(&ctx, &store, target(&originals), &policy(2)).await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].number, 2);

        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn bounded_by_attempts_times_interval() {
        let originals = vec![raw(1)];
        let outputs = (0..4).map(|_| detail_output("running", None)).collect();
        let (mut ctx, dir) = context("bounded", outputs);
        ctx.clock = Box::new(crate::adapters::live::clock::LiveClock);
        let store = TriageStore::new();
        let policy = PollPolicy { max_attempts: 4, interval: Duration::from_millis(5), ..PollPolicy::default() };

        let started = std::time::Instant::now();
        let result = poll_session(&ctx, &store, target(&originals), &policy).await;
        let elapsed = started.elapsed();

        assert!(result.is_empty());
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_millis(20) + Duration::from_secs(1));

        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
