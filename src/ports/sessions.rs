//! Analysis session port for the remote AI agent service.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Deserializer, Serialize};

/// Boxed future type alias used by [`SessionService`] to keep the trait dyn-compatible.
pub type SessionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, Box<dyn Error + Send + Sync>>> + Send + 'a>>;

/// Session statuses after which no further output arrives.
const TERMINAL_STATUSES: [&str; 3] = ["exit", "error", "suspended"];

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request body for creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Prompt text that starts the session.
    pub prompt: String,
    /// JSON schema the session's structured output should follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output_schema: Option<serde_json::Value>,
    /// Whether the service may return an existing session for the same prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
}

/// Handle returned when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Opaque session identifier.
    pub session_id: String,
    /// Initial status reported by the service.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Browser URL for the session.
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

/// One message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Message kind, e.g. `user_message` or `devin_message`.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    /// Identifier unique within the session.
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_id: String,
    /// Message text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Timestamp as reported by the service.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    /// Who produced the message, when the service says.
    #[serde(default)]
    pub origin: Option<String>,
}

impl SessionMessage {
    /// Returns true if this message was written by a user rather than the agent.
    #[must_use]
    pub fn is_from_user(&self) -> bool {
        self.kind == "user_message" || self.origin.as_deref() == Some("user")
    }
}

/// Current state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    /// Opaque session identifier.
    pub session_id: String,
    /// Coarse status, e.g. `running`, `blocked`, `exit`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Finer status such as `working` or `finished`.
    #[serde(default)]
    pub status_detail: Option<String>,
    /// The same finer status under its newer field name.
    #[serde(default)]
    pub status_enum: Option<String>,
    /// Browser URL for the session.
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Structured output the session maintains, if any.
    #[serde(default)]
    pub structured_output: Option<serde_json::Value>,
    /// Transcript, oldest first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<SessionMessage>,
}

impl SessionDetail {
    /// The finer status, preferring `status_detail` over `status_enum`.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.status_detail.as_deref().or(self.status_enum.as_deref())
    }

    /// Returns true once the session will produce no further output.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status.as_str()) || self.phase() == Some("finished")
    }
}

/// Drives sessions on the remote analysis service.
pub trait SessionService: Send + Sync {
    /// Creates a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    fn create(&self, request: &CreateSessionRequest) -> SessionFuture<'_, SessionHandle>;

    /// Fetches the current detail of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    fn detail(&self, session_id: &str) -> SessionFuture<'_, SessionDetail>;

    /// Sends a follow-up message to a running session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn send_message(&self, session_id: &str, message: &str) -> SessionFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(status: &str, status_detail: Option<&str>) -> SessionDetail {
        SessionDetail {
            session_id: "s-1".into(),
            status: status.into(),
            status_detail: status_detail.map(String::from),
            status_enum: None,
            url: String::new(),
            structured_output: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(detail("exit", None).is_terminal());
        assert!(detail("error", None).is_terminal());
        assert!(detail("suspended", None).is_terminal());
        assert!(detail("running", Some("finished")).is_terminal());
        assert!(!detail("running", Some("working")).is_terminal());
        assert!(!detail("blocked", None).is_terminal());
    }

    #[test]
    fn status_enum_is_accepted_as_status_detail() {
        let parsed: SessionDetail = serde_json::from_value(json!({
            "session_id": "s-9",
            "status": "running",
            "status_enum": "finished"
        }))
        .unwrap();
        assert_eq!(parsed.phase(), Some("finished"));
        assert!(parsed.messages.is_empty());
        assert!(parsed.is_terminal());
    }

    #[test]
    fn detail_with_both_status_fields_parses() {
        let parsed: SessionDetail = serde_json::from_value(json!({
            "session_id": "s-9",
            "status": "running",
            "status_detail": "working",
            "status_enum": "finished"
        }))
        .unwrap();
        assert_eq!(parsed.phase(), Some("working"));
        assert!(!parsed.is_terminal());

        let finished: SessionDetail = serde_json::from_value(json!({
            "session_id": "s-9",
            "status": "running",
            "status_detail": null,
            "status_enum": "finished"
        }))
        .unwrap();
        assert!(finished.is_terminal());
    }

    #[test]
    fn null_fields_read_as_empty() {
        let parsed: SessionDetail = serde_json::from_value(json!({
            "session_id": "s-9",
            "status": null,
            "url": null,
            "structured_output": null,
            "messages": [{"type": "devin_message", "event_id": null, "message": "hi", "timestamp": null}]
        }))
        .unwrap();
        assert_eq!(parsed.status, "");
        assert!(!parsed.is_terminal());
        assert_eq!(parsed.messages[0].message, "hi");
        assert_eq!(parsed.messages[0].event_id, "");

        let handle: SessionHandle =
            serde_json::from_value(json!({"session_id": "s-9", "status": null, "url": null})).unwrap();
        assert_eq!(handle.status, "");
    }

    #[test]
    fn create_request_omits_unset_fields() {
        let request = CreateSessionRequest {
            prompt: "hello".into(),
            structured_output_schema: None,
            idempotent: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"prompt": "hello"}));
    }
}
