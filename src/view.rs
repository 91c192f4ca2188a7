//! Filtering, sorting and grouping of stored issues for the dashboard.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::triage::model::{AnalyzedIssue, Difficulty, Priority};

/// Group name used for issues without a feature.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Raw query parameters of the issue listing.
///
/// Filters are comma-separated multi-selects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueQuery {
    /// `priority`, `difficulty` or `feature`.
    pub sort: Option<String>,
    /// `asc` or `desc`.
    pub direction: Option<String>,
    /// Features to keep.
    pub feature: Option<String>,
    /// Priorities to keep.
    pub priority: Option<String>,
    /// Difficulties to keep.
    pub difficulty: Option<String>,
    /// `true` or `false`.
    pub stale: Option<String>,
}

/// Sort key of the listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Most urgent first when ascending.
    #[default]
    Priority,
    /// Easiest first when ascending.
    Difficulty,
    /// Alphabetical when ascending; groups the result.
    Feature,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Validated listing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Sort key.
    pub sort: SortKey,
    /// Sort direction.
    pub direction: Direction,
    /// Feature filter; `None` keeps every feature.
    pub features: Option<HashSet<String>>,
    /// Priority filter; `None` keeps every priority.
    pub priorities: Option<HashSet<Priority>>,
    /// Difficulty filter; `None` keeps every difficulty.
    pub difficulties: Option<HashSet<Difficulty>>,
    /// Stale filter; `None` keeps both.
    pub stale: Option<bool>,
}

impl IssueQuery {
    /// Validates the query.
    ///
    /// Unrecognised filter values match nothing; an unknown sort key,
    /// direction or stale flag is an error.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending parameter.
    pub fn parse(&self) -> Result<ViewOptions, String> {
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("" | "priority") => SortKey::Priority,
            Some("difficulty") => SortKey::Difficulty,
            Some("feature") => SortKey::Feature,
            Some(other) => return Err(format!("Invalid sort: {other}")),
        };
        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("" | "asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => return Err(format!("Invalid direction: {other}")),
        };
        let stale = match self.stale.as_deref().map(str::trim) {
            None | Some("") => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => return Err(format!("Invalid stale flag: {other}")),
        };

        Ok(ViewOptions {
            sort,
            direction,
            features: multi_select(self.feature.as_deref(), |v| Some(v.to_lowercase())),
            priorities: multi_select(self.priority.as_deref(), Priority::parse),
            difficulties: multi_select(self.difficulty.as_deref(), Difficulty::parse),
            stale,
        })
    }
}

fn multi_select<T: Eq + std::hash::Hash>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<HashSet<T>> {
    let tokens: Vec<&str> =
        raw?.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.into_iter().filter_map(parse).collect())
}

/// Issues sharing a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureGroup {
    /// Feature name, or `uncategorized`.
    pub feature: String,
    /// Issues in listing order.
    pub issues: Vec<AnalyzedIssue>,
}

/// The listing as the dashboard renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueView {
    /// Filtered and sorted issues.
    pub issues: Vec<AnalyzedIssue>,
    /// Starred issues among `issues`, in the same order.
    pub starred: Vec<AnalyzedIssue>,
    /// Feature groups when sorting by feature without a feature filter.
    pub groups: Option<Vec<FeatureGroup>>,
    /// Every distinct feature in the store, sorted.
    pub features: Vec<String>,
}

fn feature_key(issue: &AnalyzedIssue) -> &str {
    if issue.feature.is_empty() {
        UNCATEGORIZED
    } else {
        &issue.feature
    }
}

/// Builds the listing from the stored issues.
#[must_use]
pub fn build_view(issues: &[AnalyzedIssue], starred: &BTreeSet<u64>, opts: &ViewOptions) -> IssueView {
    let features: Vec<String> = issues
        .iter()
        .map(|i| i.feature.clone())
        .filter(|f| !f.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut listed: Vec<AnalyzedIssue> = issues
        .iter()
        .filter(|i| opts.features.as_ref().is_none_or(|f| f.contains(&i.feature.to_lowercase())))
        .filter(|i| opts.priorities.as_ref().is_none_or(|p| p.contains(&i.priority)))
        .filter(|i| opts.difficulties.as_ref().is_none_or(|d| d.contains(&i.difficulty)))
        .filter(|i| opts.stale.is_none_or(|s| i.stale == s))
        .cloned()
        .collect();

    let directed = |ordering: Ordering| match opts.direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    };
    match opts.sort {
        SortKey::Priority => listed.sort_by(|a, b| directed(a.priority.cmp(&b.priority))),
        SortKey::Difficulty => listed.sort_by(|a, b| directed(a.difficulty.cmp(&b.difficulty))),
        SortKey::Feature => listed.sort_by(|a, b| directed(feature_key(a).cmp(feature_key(b)))),
    }

    let groups = (opts.sort == SortKey::Feature && opts.features.is_none()).then(|| group(&listed));
    let starred_issues = listed.iter().filter(|i| starred.contains(&i.number)).cloned().collect();

    IssueView { issues: listed, starred: starred_issues, groups, features }
}

/// Splits an already feature-sorted list into consecutive groups.
fn group(sorted: &[AnalyzedIssue]) -> Vec<FeatureGroup> {
    let mut groups: Vec<FeatureGroup> = Vec::new();
    for issue in sorted {
        let key = feature_key(issue);
        match groups.last_mut() {
            Some(last) if last.feature == key => last.issues.push(issue.clone()),
            _ => groups.push(FeatureGroup { feature: key.to_string(), issues: vec![issue.clone()] }),
        }
    }
    groups
}
