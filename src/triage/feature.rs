//! Label-based feature inference for issues the analyzer did not tag.

use crate::ports::issues::Label;

/// Keyword rules checked in order; the first rule with a keyword contained
/// in any lower-cased label name wins.
const RULES: [(&[&str], &str); 7] = [
    (&["bug"], "bug-fix"),
    (&["enhancement", "feature"], "enhancement"),
    (&["doc"], "documentation"),
    (&["ui", "frontend"], "ui"),
    (&["api", "backend"], "api"),
    (&["test"], "testing"),
    (&["infra", "deploy"], "infrastructure"),
];

/// Feature used when no rule matches.
pub const GENERAL_FEATURE: &str = "general";

/// Infers a feature tag from an issue's labels.
#[must_use]
pub fn infer_feature(labels: &[Label]) -> &'static str {
    let names: Vec<String> = labels.iter().map(|l| l.name.to_lowercase()).collect();
    RULES
        .iter()
        .find(|(keywords, _)| {
            names.iter().any(|name| keywords.iter().any(|keyword| name.contains(keyword)))
        })
        .map_or(GENERAL_FEATURE, |(_, feature)| *feature)
}
