//! Replaying adapter for the `IssueSource` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::issues::{IssueFuture, IssueSource, RawIssue};

/// Serves recorded issue listings from a cassette.
pub struct ReplayingIssueSource {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingIssueSource {
    /// Create a replaying issue source backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl IssueSource for ReplayingIssueSource {
    fn list_open(&self, max: usize) -> IssueFuture<'_, Vec<RawIssue>> {
        let output = next_output(&self.replayer, "issues", "list_open");
        Box::pin(async move {
            let mut issues: Vec<RawIssue> = replay_result(output)?;
            issues.truncate(max);
            Ok(issues)
        })
    }

    fn get(&self, _number: u64) -> IssueFuture<'_, RawIssue> {
        let output = next_output(&self.replayer, "issues", "get");
        Box::pin(async move { replay_result(output) })
    }
}
