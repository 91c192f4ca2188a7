//! Issue source port for reading a repository's issues.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`IssueSource`] to keep the trait dyn-compatible.
pub type IssueFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, Box<dyn Error + Send + Sync>>> + Send + 'a>>;

/// A label attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name as shown in the tracker.
    pub name: String,
    /// Hex colour without the leading `#`.
    #[serde(default)]
    pub color: String,
}

/// An open issue as fetched from the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    /// The issue number, unique within the repository.
    pub number: u64,
    /// The issue title.
    pub title: String,
    /// The issue body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// Labels in tracker order.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// When the issue was opened.
    pub created_at: DateTime<Utc>,
    /// Number of comments on the issue.
    #[serde(default)]
    pub comments: u32,
    /// Canonical browser URL.
    pub html_url: String,
}

/// Reads issues from an external tracker.
///
/// Abstracting the tracker allows deterministic replay and testing
/// without touching a real issue tracker API.
pub trait IssueSource: Send + Sync {
    /// Lists open issues newest first, excluding pull requests, capped at `max`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page of the listing cannot be fetched.
    fn list_open(&self, max: usize) -> IssueFuture<'_, Vec<RawIssue>>;

    /// Fetches a single issue by number.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue cannot be fetched.
    fn get(&self, number: u64) -> IssueFuture<'_, RawIssue>;
}
