//! Follow-up research chats about a single issue.
//!
//! Each chat is a fresh session on the analysis service. The store keeps a
//! local transcript; agent replies are imported from the session detail
//! whenever the chat is refreshed.

use serde::Serialize;

use crate::context::ServiceContext;
use crate::ports::sessions::{CreateSessionRequest, SessionDetail, SessionMessage};
use crate::store::TriageStore;

/// Characters of the issue body included in the research prompt.
const PROMPT_BODY_CHARS: usize = 2000;

/// Note appended when the session ends with an unanswered question.
pub const COMPLETED_NOTE: &str =
    "Session has completed. You can start a new session for further questions.";

/// One turn of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Session event this turn was imported from.
    #[serde(skip)]
    pub event_id: Option<String>,
}

impl ChatMessage {
    fn user(content: &str, timestamp: String) -> Self {
        Self { role: "user".into(), content: content.into(), timestamp, event_id: None }
    }

    fn assistant(content: &str, timestamp: String, event_id: Option<String>) -> Self {
        Self { role: "assistant".into(), content: content.into(), timestamp, event_id }
    }

    /// Whether the user wrote this turn.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// A research chat and its local transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSession {
    /// Session id at the analysis service.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Issue the chat is about.
    #[serde(rename = "issueNumber")]
    pub issue_number: u64,
    /// Last known session status.
    pub status: String,
    /// Last known finer status.
    #[serde(rename = "statusDetail")]
    pub status_detail: Option<String>,
    /// Browser URL for the session.
    pub url: String,
    /// Transcript, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Opens a research session about `issue_number` and records the question.
///
/// # Errors
///
/// Returns an error if the issue cannot be fetched or the session cannot
/// be created.
pub async fn start_chat(
    ctx: &ServiceContext,
    store: &TriageStore,
    issue_number: u64,
    question: &str,
) -> Result<ChatSession, String> {
    let issue = ctx
        .issues
        .get(issue_number)
        .await
        .map_err(|e| format!("Failed to fetch issue #{issue_number}: {e}"))?;

    let body: String = issue
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or("No description")
        .chars()
        .take(PROMPT_BODY_CHARS)
        .collect();
    let prompt = format!(
        "You are researching a GitHub issue.\n\n\
         Issue #{issue_number}: \"{}\"\n\
         Description: {body}\n\n\
         The user has the following question about this issue:\n{question}\n\n\
         Research the issue in the context of its codebase and give a helpful, detailed answer. \
         Reference specific files or components where relevant.",
        issue.title
    );

    let handle = ctx
        .sessions
        .create(&CreateSessionRequest {
            prompt,
            structured_output_schema: None,
            idempotent: Some(false),
        })
        .await
        .map_err(|e| format!("Failed to create chat session: {e}"))?;
    tracing::info!(session_id = %handle.session_id, issue = issue_number, "chat session created");

    let chat = ChatSession {
        session_id: handle.session_id,
        issue_number,
        status: "running".into(),
        status_detail: None,
        url: handle.url,
        messages: vec![ChatMessage::user(question, ctx.clock.now().to_rfc3339())],
    };
    store.insert_chat(chat.clone());
    Ok(chat)
}

/// Sends a follow-up question to an existing chat.
///
/// Returns `Ok(None)` when no chat with `session_id` is known.
///
/// # Errors
///
/// Returns an error if the message cannot be delivered.
pub async fn continue_chat(
    ctx: &ServiceContext,
    store: &TriageStore,
    session_id: &str,
    message: &str,
) -> Result<Option<ChatSession>, String> {
    if store.chat(session_id).is_none() {
        return Ok(None);
    }
    ctx.sessions
        .send_message(session_id, message)
        .await
        .map_err(|e| format!("Failed to send message: {e}"))?;

    let timestamp = ctx.clock.now().to_rfc3339();
    Ok(store.update_chat(session_id, |chat| {
        chat.messages.push(ChatMessage::user(message, timestamp));
    }))
}

/// Pulls new agent replies and the current status into a chat.
///
/// Returns `Ok(None)` when no chat with `session_id` is known.
///
/// # Errors
///
/// Returns an error if the session detail cannot be fetched.
pub async fn refresh_chat(
    ctx: &ServiceContext,
    store: &TriageStore,
    session_id: &str,
) -> Result<Option<ChatSession>, String> {
    if store.chat(session_id).is_none() {
        return Ok(None);
    }
    let detail = ctx
        .sessions
        .detail(session_id)
        .await
        .map_err(|e| format!("Failed to get session: {e}"))?;
    let now = ctx.clock.now().to_rfc3339();

    Ok(store.update_chat(session_id, |chat| apply_detail(chat, &detail, &now)))
}

/// Identity of a transcript message: its event id, or its service
/// timestamp and text when the service sent no id.
fn import_key(message: &SessionMessage) -> String {
    if message.event_id.is_empty() {
        format!("{}|{}", message.timestamp, message.message)
    } else {
        message.event_id.clone()
    }
}

fn apply_detail(chat: &mut ChatSession, detail: &SessionDetail, now: &str) {
    for message in detail.messages.iter().filter(|m| !m.is_from_user()) {
        let key = import_key(message);
        let seen = chat.messages.iter().any(|m| m.event_id.as_deref() == Some(key.as_str()));
        if seen || message.message.trim().is_empty() {
            continue;
        }
        let timestamp =
            if message.timestamp.is_empty() { now.to_string() } else { message.timestamp.clone() };
        chat.messages.push(ChatMessage::assistant(&message.message, timestamp, Some(key)));
    }

    chat.status.clone_from(&detail.status);
    chat.status_detail = detail.phase().map(String::from);
    if !detail.url.is_empty() {
        chat.url.clone_from(&detail.url);
    }

    if detail.is_terminal() && chat.messages.last().is_some_and(ChatMessage::is_user) {
        chat.messages.push(ChatMessage::assistant(COMPLETED_NOTE, now.to_string(), None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> ChatSession {
        ChatSession {
            session_id: "c-1".into(),
            issue_number: 42,
            status: "running".into(),
            status_detail: None,
            url: String::new(),
            messages: vec![ChatMessage::user("Where do I start?", "t0".into())],
        }
    }

    fn message(kind: &str, event_id: &str, text: &str) -> SessionMessage {
        SessionMessage {
            kind: kind.into(),
            event_id: event_id.into(),
            message: text.into(),
            timestamp: format!("ts-{event_id}"),
            origin: None,
        }
    }

    fn detail(status: &str, messages: Vec<SessionMessage>) -> SessionDetail {
        SessionDetail {
            session_id: "c-1".into(),
            status: status.into(),
            status_detail: None,
            status_enum: None,
            url: "https://app.example/sessions/c-1".into(),
            structured_output: None,
            messages,
        }
    }

    #[test]
    fn imports_agent_messages_once() {
        let mut chat = chat();
        let d = detail(
            "running",
            vec![
                message("user_message", "e1", "Where do I start?"),
                message("devin_message", "e2", "Look at src/auth."),
            ],
        );

        apply_detail(&mut chat, &d, "now");
        apply_detail(&mut chat, &d, "now");

        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].role, "assistant");
        assert_eq!(chat.messages[1].content, "Look at src/auth.");
        assert_eq!(chat.messages[1].timestamp, "ts-e2");
        assert_eq!(chat.url, "https://app.example/sessions/c-1");
    }

    #[test]
    fn messages_without_event_ids_are_each_imported_once() {
        let mut chat = chat();
        let mut first = message("devin_message", "", "Checking the code.");
        first.timestamp = "t1".into();
        let mut second = message("devin_message", "", "Start in src/auth.");
        second.timestamp = "t2".into();

        apply_detail(&mut chat, &detail("running", vec![first.clone()]), "now");
        apply_detail(&mut chat, &detail("running", vec![first, second]), "now");

        let contents: Vec<&str> = chat.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Where do I start?", "Checking the code.", "Start in src/auth."]);
    }

    #[test]
    fn finished_session_with_unanswered_question_gets_note() {
        let mut chat = chat();
        let mut d = detail("blocked", vec![]);
        d.status_detail = Some("finished".into());

        apply_detail(&mut chat, &d, "now");
        apply_detail(&mut chat, &d, "now");

        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].content, COMPLETED_NOTE);
        assert_eq!(chat.status_detail.as_deref(), Some("finished"));
    }

    #[test]
    fn answered_session_gets_no_note() {
        let mut chat = chat();
        let d = detail("exit", vec![message("devin_message", "e2", "Answer")]);

        apply_detail(&mut chat, &d, "now");

        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].content, "Answer");
        assert_eq!(chat.status, "exit");
    }

    #[test]
    fn running_session_gets_no_note() {
        let mut chat = chat();
        apply_detail(&mut chat, &detail("running", vec![]), "now");
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn event_id_is_not_serialized() {
        let value = serde_json::to_value(ChatMessage::assistant("a", "t".into(), Some("e".into())))
            .unwrap();
        assert!(value.get("event_id").is_none());
        assert_eq!(value["role"], "assistant");
    }
}
