//! Recording adapter for the `IssueSource` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::issues::{IssueFuture, IssueSource, RawIssue};

/// Records issue source interactions while delegating to an inner implementation.
pub struct RecordingIssueSource {
    inner: Box<dyn IssueSource>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingIssueSource {
    /// Creates a new recording issue source wrapping the given implementation.
    pub fn new(inner: Box<dyn IssueSource>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct ListOpenInput {
    max: usize,
}

#[derive(Serialize)]
struct GetInput {
    number: u64,
}

impl IssueSource for RecordingIssueSource {
    fn list_open(&self, max: usize) -> IssueFuture<'_, Vec<RawIssue>> {
        Box::pin(async move {
            let result = self.inner.list_open(max).await;
            record_result(&self.recorder, "issues", "list_open", &ListOpenInput { max }, &result);
            result
        })
    }

    fn get(&self, number: u64) -> IssueFuture<'_, RawIssue> {
        Box::pin(async move {
            let result = self.inner.get(number).await;
            record_result(&self.recorder, "issues", "get", &GetInput { number }, &result);
            result
        })
    }
}
