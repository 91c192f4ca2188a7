//! Turns a session's output into analysis records.
//!
//! Nothing here fails: malformed payloads come back as `None` or
//! [`SessionOutput::Malformed`] and the polling loop decides what that means.

use serde_json::Value;

use super::model::AnalysisRecord;
use crate::ports::sessions::{SessionDetail, SessionMessage};

/// What a single poll of a session yielded.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    /// Still running and nothing to read yet.
    Pending,
    /// Still running with the records published so far.
    Partial(Vec<AnalysisRecord>),
    /// Finished; the final records, possibly empty.
    Terminal(Vec<AnalysisRecord>),
    /// Still running but the output could not be read.
    Malformed,
}

impl SessionOutput {
    /// Classifies a session detail.
    ///
    /// The session's structured output is preferred. Without one, records
    /// are collected from the agent's transcript messages. `is_terminal`
    /// is consulted after extraction so a final payload delivered together
    /// with a terminal status is kept.
    #[must_use]
    pub fn classify(detail: &SessionDetail, is_terminal: fn(&SessionDetail) -> bool) -> Self {
        let extracted = match &detail.structured_output {
            Some(blob) => parse_structured(blob).ok_or(()),
            None => Ok(records_from_transcript(&detail.messages)),
        };

        if is_terminal(detail) {
            return Self::Terminal(extracted.unwrap_or_default());
        }
        match extracted {
            Err(()) => Self::Malformed,
            Ok(records) if records.is_empty() && detail.structured_output.is_none() => {
                Self::Pending
            }
            Ok(records) => Self::Partial(records),
        }
    }
}

/// Parses a structured-output blob of the form `{"issues": [...]}`.
///
/// Returns `None` when `issues` is missing or not an array. Entries without
/// a numeric `number` are skipped.
#[must_use]
pub fn parse_structured(blob: &Value) -> Option<Vec<AnalysisRecord>> {
    let entries = blob.get("issues")?.as_array()?;
    Some(entries.iter().filter_map(AnalysisRecord::from_value).collect())
}

/// Parses one issue's analysis out of a free-text chat message.
///
/// The message may wrap the JSON in a fenced code block or surround it
/// with prose. A numeric `number` and a string `summary` are required.
#[must_use]
pub fn parse_message(content: &str) -> Option<AnalysisRecord> {
    let text = strip_fence(content.trim());
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    if !value.get("summary").is_some_and(Value::is_string) {
        return None;
    }
    AnalysisRecord::from_value(&value)
}

/// Collects records from the agent's messages, later ones replacing
/// earlier ones for the same issue.
fn records_from_transcript(messages: &[SessionMessage]) -> Vec<AnalysisRecord> {
    let mut records: Vec<AnalysisRecord> = Vec::new();
    for record in messages
        .iter()
        .filter(|m| !m.is_from_user())
        .filter_map(|m| parse_message(&m.message))
    {
        match records.iter_mut().find(|r| r.number == record.number) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }
    records
}

/// Returns the contents of the first closed ```` ``` ```` fence, or the
/// input unchanged when there is none.
fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let rest = &text[open + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.find("```") {
        Some(close) => rest[..close].trim(),
        None => text,
    }
}
