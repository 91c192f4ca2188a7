//! Process configuration read from the environment.
//!
//! `main` loads a `.env` file first (via `dotenvy`) so every setting can
//! also live there. Only the analysis credential is required, and only by
//! the operations that start analysis or chat sessions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::live::issues::GITHUB_API_BASE;
use crate::adapters::live::sessions::ANALYSIS_API_BASE;

const DEFAULT_REPO: &str = "wso2/financial-services-accelerator";
const DEFAULT_MAX_ISSUES: usize = 400;
const DEFAULT_POLL_ATTEMPTS: u32 = 120;
const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// A GitHub repository identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    /// Account or organisation owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoSlug {
    /// Parses `owner/name`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the value has exactly two non-empty parts.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self { owner: owner.to_string(), name: name.to_string() })
            }
            _ => Err(format!("Invalid repository {value:?}: expected owner/name")),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Runtime settings for the triage service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Credential for the analysis service (`ANALYSIS_API_KEY`).
    pub analysis_api_key: Option<String>,
    /// Optional GitHub token (`GITHUB_TOKEN`).
    pub github_token: Option<String>,
    /// Repository whose issues are triaged (`TRIAGE_REPO`).
    pub repo: RepoSlug,
    /// GitHub API base URL (`GITHUB_API_BASE`).
    pub github_api_base: String,
    /// Analysis service base URL (`ANALYSIS_API_BASE`).
    pub analysis_api_base: String,
    /// Cap on fetched issues (`TRIAGE_MAX_ISSUES`).
    pub max_issues: usize,
    /// Issues per analysis session; 0 puts every issue in one session
    /// (`TRIAGE_BATCH_SIZE`).
    pub batch_size: usize,
    /// Poll attempts per session (`TRIAGE_POLL_ATTEMPTS`).
    pub poll_attempts: u32,
    /// Delay before each poll (`TRIAGE_POLL_INTERVAL_MS`).
    pub poll_interval: Duration,
    /// Allowed browser origin for CORS (`FRONTEND_URL`).
    pub frontend_url: Option<String>,
    /// Cassette path to record every port interaction to (`TRIAGE_RECORD`).
    pub record_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            analysis_api_key: None,
            github_token: None,
            repo: RepoSlug { owner: "wso2".into(), name: "financial-services-accelerator".into() },
            github_api_base: GITHUB_API_BASE.to_string(),
            analysis_api_base: ANALYSIS_API_BASE.to_string(),
            max_issues: DEFAULT_MAX_ISSUES,
            batch_size: 0,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            frontend_url: None,
            record_path: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary lookup function.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            analysis_api_key: get("ANALYSIS_API_KEY"),
            github_token: get("GITHUB_TOKEN"),
            repo: RepoSlug::parse(&get("TRIAGE_REPO").unwrap_or_else(|| DEFAULT_REPO.into()))?,
            github_api_base: get("GITHUB_API_BASE").unwrap_or(defaults.github_api_base),
            analysis_api_base: get("ANALYSIS_API_BASE").unwrap_or(defaults.analysis_api_base),
            max_issues: parse_number(get("TRIAGE_MAX_ISSUES"), "TRIAGE_MAX_ISSUES")?
                .unwrap_or(defaults.max_issues),
            batch_size: parse_number(get("TRIAGE_BATCH_SIZE"), "TRIAGE_BATCH_SIZE")?
                .unwrap_or(defaults.batch_size),
            poll_attempts: parse_number(get("TRIAGE_POLL_ATTEMPTS"), "TRIAGE_POLL_ATTEMPTS")?
                .unwrap_or(defaults.poll_attempts),
            poll_interval: parse_number(get("TRIAGE_POLL_INTERVAL_MS"), "TRIAGE_POLL_INTERVAL_MS")?
                .map_or(defaults.poll_interval, Duration::from_millis),
            frontend_url: get("FRONTEND_URL"),
            record_path: get("TRIAGE_RECORD").map(PathBuf::from),
        })
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str) -> Result<Option<T>, String> {
    value
        .map(|v| v.parse::<T>().map_err(|_| format!("{key} must be a non-negative integer, got {v:?}")))
        .transpose()
}
