//! In-memory triage store shared by the analysis run and the HTTP handlers.
//!
//! Everything lives for the lifetime of the process; nothing is persisted.
//! All state sits behind one mutex and no method holds it across an await.
//!
//! Issues are replaced wholesale only by [`TriageStore::begin_run`]; within a
//! run they are append-only and an issue number is never stored twice.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::triage::chat::ChatSession;
use crate::triage::model::{AnalyzedIssue, Progress};

/// Lifecycle of the analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has started.
    #[default]
    Idle,
    /// Fetching issues from the tracker.
    Fetching,
    /// Waiting on analysis sessions.
    Analyzing,
    /// The last run finished.
    Complete,
    /// The last run failed.
    Error,
}

impl RunStatus {
    /// Returns true while a run is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Fetching | Self::Analyzing)
    }
}

/// Remote session created for one batch of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSessionRef {
    /// Session identifier at the analysis service.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Zero-based batch index within the run.
    #[serde(rename = "batchIndex")]
    pub batch_index: usize,
    /// Issues sent to this session.
    #[serde(rename = "issueNumbers")]
    pub issue_numbers: Vec<u64>,
}

/// Point-in-time copy of the run state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    /// Issues stored so far.
    pub issues: Vec<AnalyzedIssue>,
    /// Run status.
    pub status: RunStatus,
    /// Error text of a failed run.
    pub error: Option<String>,
    /// Run progress.
    pub progress: Progress,
}

#[derive(Default)]
struct StoreState {
    issues: Vec<AnalyzedIssue>,
    status: RunStatus,
    error: Option<String>,
    progress: Progress,
    sessions: HashMap<String, AnalysisSessionRef>,
    chats: HashMap<String, ChatSession>,
    starred: BTreeSet<u64>,
}

/// Process-wide triage state.
#[derive(Default)]
pub struct TriageStore {
    state: Mutex<StoreState>,
}

impl TriageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("store lock poisoned")
    }

    /// Starts a new run unless one is already active.
    ///
    /// On success the issues, progress, error and session registry are
    /// cleared and the status becomes `fetching`. Returns false, changing
    /// nothing, while another run is fetching or analyzing.
    pub fn begin_run(&self) -> bool {
        let mut state = self.lock();
        if state.status.is_active() {
            return false;
        }
        state.issues.clear();
        state.sessions.clear();
        state.progress = Progress::default();
        state.status = RunStatus::Fetching;
        state.error = None;
        true
    }

    /// Sets the run status.
    ///
    /// An error message is kept until the next `idle` or `fetching` status.
    pub fn set_status(&self, status: RunStatus, error: Option<String>) {
        let mut state = self.lock();
        state.status = status;
        if error.is_some() {
            state.error = error;
        }
        if matches!(status, RunStatus::Idle | RunStatus::Fetching) {
            state.error = None;
        }
    }

    /// Replaces the run progress.
    pub fn set_progress(&self, completed: usize, total: usize, current: Option<String>) {
        self.lock().progress = Progress { completed, total, current };
    }

    /// Appends issues whose numbers are not stored yet and returns how many were added.
    pub fn add_issues(&self, issues: Vec<AnalyzedIssue>) -> usize {
        let mut state = self.lock();
        let mut present: HashSet<u64> = state.issues.iter().map(|i| i.number).collect();
        let before = state.issues.len();
        for issue in issues {
            if present.insert(issue.number) {
                state.issues.push(issue);
            }
        }
        state.issues.len() - before
    }

    /// All stored issues in insertion order.
    #[must_use]
    pub fn issues(&self) -> Vec<AnalyzedIssue> {
        self.lock().issues.clone()
    }

    /// A stored issue by number.
    #[must_use]
    pub fn issue(&self, number: u64) -> Option<AnalyzedIssue> {
        self.lock().issues.iter().find(|i| i.number == number).cloned()
    }

    /// Run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    /// Issues, status, error and progress taken under one lock.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.lock();
        RunSnapshot {
            issues: state.issues.clone(),
            status: state.status,
            error: state.error.clone(),
            progress: state.progress.clone(),
        }
    }

    /// Remembers the remote session serving a batch, keyed by `key`.
    pub fn register_session(&self, key: impl Into<String>, session: AnalysisSessionRef) {
        self.lock().sessions.insert(key.into(), session);
    }

    /// Sessions of the current run ordered by batch.
    #[must_use]
    pub fn analysis_sessions(&self) -> Vec<AnalysisSessionRef> {
        let mut sessions: Vec<_> = self.lock().sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.batch_index);
        sessions
    }

    /// Stores a chat session under its session id.
    pub fn insert_chat(&self, chat: ChatSession) {
        self.lock().chats.insert(chat.session_id.clone(), chat);
    }

    /// A copy of a chat session.
    #[must_use]
    pub fn chat(&self, session_id: &str) -> Option<ChatSession> {
        self.lock().chats.get(session_id).cloned()
    }

    /// Mutates a chat session in place and returns the updated copy.
    pub fn update_chat(
        &self,
        session_id: &str,
        update: impl FnOnce(&mut ChatSession),
    ) -> Option<ChatSession> {
        let mut state = self.lock();
        let chat = state.chats.get_mut(session_id)?;
        update(chat);
        Some(chat.clone())
    }

    /// Stars an issue.
    pub fn star(&self, number: u64) {
        self.lock().starred.insert(number);
    }

    /// Removes a star.
    pub fn unstar(&self, number: u64) {
        self.lock().starred.remove(&number);
    }

    /// Starred issue numbers in ascending order.
    #[must_use]
    pub fn starred(&self) -> BTreeSet<u64> {
        self.lock().starred.clone()
    }

    /// Whether an issue is starred.
    #[must_use]
    pub fn is_starred(&self, number: u64) -> bool {
        self.lock().starred.contains(&number)
    }
}
