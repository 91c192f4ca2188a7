//! Merging analysis records with the issues they describe.

use std::collections::{HashMap, HashSet};

use super::feature::infer_feature;
use super::model::{AnalysisRecord, AnalyzedIssue, Difficulty, Priority};
use crate::ports::issues::RawIssue;

/// Length, in characters, of the body excerpt used as a fallback summary.
pub const EXCERPT_CHARS: usize = 200;

const NO_DESCRIPTION: &str = "No description";

/// First [`EXCERPT_CHARS`] characters of the issue body.
#[must_use]
pub fn body_excerpt(issue: &RawIssue) -> String {
    match issue.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => body.chars().take(EXCERPT_CHARS).collect(),
        None => NO_DESCRIPTION.to_string(),
    }
}

/// Combines records with their original issues.
///
/// Records for numbers not among `originals` are dropped, and only the
/// first record per number is used. Empty analyzer fields fall back to
/// values derived from the issue itself.
#[must_use]
pub fn merge_records(records: &[AnalysisRecord], originals: &[RawIssue]) -> Vec<AnalyzedIssue> {
    let by_number: HashMap<u64, &RawIssue> = originals.iter().map(|i| (i.number, i)).collect();
    let mut seen = HashSet::new();

    records
        .iter()
        .filter_map(|record| {
            let original = by_number.get(&record.number)?;
            seen.insert(record.number).then(|| merge_one(record, original))
        })
        .collect()
}

fn merge_one(record: &AnalysisRecord, original: &RawIssue) -> AnalyzedIssue {
    let summary = if record.summary.is_empty() {
        body_excerpt(original)
    } else {
        record.summary.clone()
    };
    let feature = if record.feature.is_empty() {
        infer_feature(&original.labels).to_string()
    } else {
        record.feature.clone()
    };

    AnalyzedIssue {
        number: original.number,
        title: original.title.clone(),
        summary,
        priority: record.priority.unwrap_or(Priority::Medium),
        difficulty: record.difficulty.unwrap_or(Difficulty::Medium),
        feature,
        stale: record.stale,
        stale_reason: record.stale_reason,
        has_pr: record.has_pr,
        starting_point: record.starting_point.clone(),
        html_url: original.html_url.clone(),
        labels: original.labels.clone(),
        created_at: original.created_at,
        comments: original.comments,
    }
}

/// Default classification for an issue the analyzer never covered.
#[must_use]
pub fn fallback_issue(original: &RawIssue) -> AnalyzedIssue {
    merge_one(&AnalysisRecord { number: original.number, ..AnalysisRecord::default() }, original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::issues::Label;
    use crate::triage::model::StaleReason;

    fn raw(number: u64, body: Option<&str>, labels: &[&str]) -> RawIssue {
        RawIssue {
            number,
            title: format!("Issue {number}"),
            body: body.map(String::from),
            labels: labels
                .iter()
                .map(|n| Label { name: (*n).to_string(), color: "ffffff".into() })
                .collect(),
            created_at: "2024-02-01T08:00:00Z".parse().unwrap(),
            comments: 2,
            html_url: format!("https://github.com/acme/widgets/issues/{number}"),
        }
    }

    fn record(number: u64, summary: &str, feature: &str) -> AnalysisRecord {
        AnalysisRecord {
            number,
            summary: summary.into(),
            feature: feature.into(),
            priority: Some(Priority::High),
            difficulty: Some(Difficulty::Easy),
            ..AnalysisRecord::default()
        }
    }

    #[test]
    fn drops_records_for_unknown_issues() {
        let merged = merge_records(&[record(99, "s", "api")], &[raw(1, None, &[])]);
        assert!(merged.is_empty());
    }

    #[test]
    fn prefers_analyzer_fields() {
        let mut r = record(1, "Crash when saving", "storage");
        r.stale = true;
        r.stale_reason = Some(StaleReason::Duplicate);
        r.starting_point = Some("src/save.rs".into());
        let merged = merge_records(&[r], &[raw(1, Some("body"), &["bug"])]);

        let issue = &merged[0];
        assert_eq!(issue.summary, "Crash when saving");
        assert_eq!(issue.feature, "storage");
        assert_eq!(issue.priority, Priority::High);
        assert_eq!(issue.difficulty, Difficulty::Easy);
        assert!(issue.stale);
        assert_eq!(issue.stale_reason, Some(StaleReason::Duplicate));
        assert_eq!(issue.starting_point.as_deref(), Some("src/save.rs"));
        assert_eq!(issue.title, "Issue 1");
        assert_eq!(issue.comments, 2);
    }

    #[test]
    fn empty_fields_fall_back_to_issue_data() {
        let r = AnalysisRecord { number: 1, ..AnalysisRecord::default() };
        let merged = merge_records(&[r], &[raw(1, Some("The docs are wrong"), &["Documentation"])]);

        let issue = &merged[0];
        assert_eq!(issue.summary, "The docs are wrong");
        assert_eq!(issue.feature, "documentation");
        assert_eq!(issue.priority, Priority::Medium);
        assert_eq!(issue.difficulty, Difficulty::Medium);
    }

    #[test]
    fn first_record_per_number_wins() {
        let merged = merge_records(
            &[record(1, "first", "api"), record(1, "second", "ui")],
            &[raw(1, None, &[])],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].summary, "first");
    }

    #[test]
    fn merging_twice_is_identical() {
        let originals = [raw(1, None, &[]), raw(2, Some("b"), &["test"])];
        let records = [record(2, "two", ""), record(1, "one", "api")];
        assert_eq!(merge_records(&records, &originals), merge_records(&records, &originals));
    }

    #[test]
    fn excerpt_truncates_by_characters() {
        let body = "é".repeat(250);
        let excerpt = body_excerpt(&raw(1, Some(&body), &[]));
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn excerpt_of_missing_body() {
        assert_eq!(body_excerpt(&raw(1, None, &[])), "No description");
        assert_eq!(body_excerpt(&raw(1, Some("   "), &[])), "No description");
    }

    #[test]
    fn fallback_uses_defaults() {
        let issue = fallback_issue(&raw(5, Some("Please add dark mode"), &["enhancement"]));
        assert_eq!(issue.number, 5);
        assert_eq!(issue.summary, "Please add dark mode");
        assert_eq!(issue.feature, "enhancement");
        assert_eq!(issue.priority, Priority::Medium);
        assert_eq!(issue.difficulty, Difficulty::Medium);
        assert!(!issue.stale);
        assert_eq!(issue.stale_reason, None);
        assert!(!issue.has_pr);
    }
}
