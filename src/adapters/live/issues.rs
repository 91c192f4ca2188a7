//! Live adapter for the `IssueSource` port using the GitHub REST API.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::RepoSlug;
use crate::ports::issues::{IssueFuture, IssueSource, RawIssue};

/// Public GitHub API endpoint.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

const ISSUES_PER_PAGE: usize = 100;
const USER_AGENT: &str = "issue-triage";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Live issue source that reads one repository's issues from GitHub.
///
/// The token is optional; unauthenticated calls work with lower rate limits.
pub struct LiveIssueSource {
    client: Client,
    api_base: String,
    repo: RepoSlug,
    token: Option<String>,
}

impl LiveIssueSource {
    /// Creates a live issue source for `repo`.
    #[must_use]
    pub fn new(api_base: impl Into<String>, repo: RepoSlug, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo,
            token,
        }
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.api_base, self.repo.owner, self.repo.name)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch_json(&self, builder: RequestBuilder) -> Result<Value, BoxError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| -> BoxError { format!("GitHub API request failed: {e}").into() })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| -> BoxError { format!("Failed to read GitHub API response: {e}").into() })?;

        if !status.is_success() {
            return Err(format!("GitHub API error ({}): {text}", status.as_u16()).into());
        }

        serde_json::from_str(&text)
            .map_err(|e| -> BoxError { format!("Failed to parse GitHub API response: {e}").into() })
    }
}

/// Maps one page of raw GitHub issue records, dropping pull requests.
///
/// # Errors
///
/// Returns an error if the page is not an array or a record does not have
/// the expected issue shape.
pub fn issues_from_page(page: Value) -> Result<Vec<RawIssue>, BoxError> {
    let Value::Array(records) = page else {
        return Err("GitHub API returned a non-array issue listing".into());
    };
    records
        .into_iter()
        .filter(|record| record.get("pull_request").is_none())
        .map(|record| {
            serde_json::from_value::<RawIssue>(record)
                .map_err(|e| -> BoxError { format!("Unexpected GitHub issue shape: {e}").into() })
        })
        .collect()
}

impl IssueSource for LiveIssueSource {
    fn list_open(&self, max: usize) -> IssueFuture<'_, Vec<RawIssue>> {
        Box::pin(async move {
            let mut issues = Vec::new();
            let total_pages = max.div_ceil(ISSUES_PER_PAGE);

            for page in 1..=total_pages {
                let request = self.client.get(self.issues_url()).query(&[
                    ("state", "open".to_string()),
                    ("per_page", ISSUES_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                    ("sort", "created".to_string()),
                    ("direction", "desc".to_string()),
                ]);
                let body = self.fetch_json(request).await?;
                if body.as_array().is_some_and(Vec::is_empty) {
                    break;
                }

                issues.extend(issues_from_page(body)?);
                tracing::debug!(page, fetched = issues.len(), "fetched issue page");
                if issues.len() >= max {
                    break;
                }
            }

            issues.truncate(max);
            Ok(issues)
        })
    }

    fn get(&self, number: u64) -> IssueFuture<'_, RawIssue> {
        Box::pin(async move {
            let request = self.client.get(format!("{}/{number}", self.issues_url()));
            let body = self.fetch_json(request).await?;
            serde_json::from_value(body)
                .map_err(|e| -> BoxError { format!("Unexpected GitHub issue shape: {e}").into() })
        })
    }
}
