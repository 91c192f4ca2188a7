//! Classification types shared by the extractor, merge step, store and views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::issues::Label;

/// How urgently an issue needs attention. Ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be handled immediately.
    Critical,
    /// Should be handled soon.
    High,
    /// Default priority.
    Medium,
    /// Can wait.
    Low,
}

impl Priority {
    /// All priorities in order.
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Wire name of this priority.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parses a wire name, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Estimated effort to resolve an issue. Ordered easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Suitable for newcomers.
    Easy,
    /// Default difficulty.
    Medium,
    /// Needs familiarity with the codebase.
    Hard,
    /// Needs deep expertise.
    Expert,
}

impl Difficulty {
    /// All difficulties in order.
    pub const ALL: [Self; 4] = [Self::Easy, Self::Medium, Self::Hard, Self::Expert];

    /// Wire name of this difficulty.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Expert => "expert",
        }
    }

    /// Parses a wire name, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Why an issue was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    /// No longer applies to the current code.
    Outdated,
    /// Tracked elsewhere.
    Duplicate,
    /// Will not be addressed.
    WontFix,
    /// Could not be reproduced.
    NotReproducible,
    /// Already fixed.
    AlreadyResolved,
}

impl StaleReason {
    /// The accepted reasons.
    pub const ALL: [Self; 5] = [
        Self::Outdated,
        Self::Duplicate,
        Self::WontFix,
        Self::NotReproducible,
        Self::AlreadyResolved,
    ];

    /// Wire name of this reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outdated => "outdated",
            Self::Duplicate => "duplicate",
            Self::WontFix => "wont-fix",
            Self::NotReproducible => "not-reproducible",
            Self::AlreadyResolved => "already-resolved",
        }
    }

    /// Accepts only the exact wire names; anything else is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

/// One issue's classification as reported by the analysis session.
///
/// Fields are optional or defaulted because the analyzer's output is not
/// trusted to be complete or well-typed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisRecord {
    /// Issue number this record classifies.
    pub number: u64,
    /// Short description of the issue.
    pub summary: String,
    /// Reported priority, if recognised.
    pub priority: Option<Priority>,
    /// Reported difficulty, if recognised.
    pub difficulty: Option<Difficulty>,
    /// Short feature-area tag.
    pub feature: String,
    /// True only when the analyzer said exactly `true`.
    pub stale: bool,
    /// Accepted stale reason, if any.
    pub stale_reason: Option<StaleReason>,
    /// Whether a pull request already addresses the issue.
    pub has_pr: bool,
    /// Hint for where to start working.
    pub starting_point: Option<String>,
}

impl AnalysisRecord {
    /// Builds a record from an arbitrary JSON value.
    ///
    /// Returns `None` unless `number` is a non-negative integer. Every other
    /// field degrades to its default when missing or mistyped.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let number = value.get("number")?.as_u64()?;
        let text = |key: &str| value.get(key).and_then(Value::as_str);

        Some(Self {
            number,
            summary: text("summary").unwrap_or_default().trim().to_string(),
            priority: text("priority").and_then(Priority::parse),
            difficulty: text("difficulty").and_then(Difficulty::parse),
            feature: text("feature").unwrap_or_default().trim().to_string(),
            stale: value.get("stale") == Some(&Value::Bool(true)),
            stale_reason: text("staleReason").and_then(StaleReason::parse),
            has_pr: value.get("hasPR") == Some(&Value::Bool(true)),
            starting_point: text("startingPoint").map(String::from),
        })
    }

    /// A record is complete once it has both a summary and a feature.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.summary.is_empty() && !self.feature.is_empty()
    }
}

/// The displayed entity: an issue with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedIssue {
    /// Issue number.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Analyzer summary, or a body excerpt.
    pub summary: String,
    /// Priority, `medium` when unanalyzed.
    pub priority: Priority,
    /// Difficulty, `medium` when unanalyzed.
    pub difficulty: Difficulty,
    /// Feature-area tag.
    pub feature: String,
    /// Whether the issue is judged stale.
    pub stale: bool,
    /// Why the issue is stale.
    #[serde(rename = "staleReason")]
    pub stale_reason: Option<StaleReason>,
    /// Whether a pull request already addresses the issue.
    #[serde(rename = "hasPR")]
    pub has_pr: bool,
    /// Hint for where to start working.
    #[serde(rename = "startingPoint")]
    pub starting_point: Option<String>,
    /// Browser URL.
    pub html_url: String,
    /// Labels in tracker order.
    pub labels: Vec<Label>,
    /// When the issue was opened.
    pub created_at: DateTime<Utc>,
    /// Comment count.
    pub comments: u32,
}

/// Progress of the current analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Issues with a complete classification so far.
    pub completed: usize,
    /// Issues in the run.
    pub total: usize,
    /// Human-readable label of what is being analyzed.
    #[serde(rename = "currentIssue")]
    pub current: Option<String>,
}
