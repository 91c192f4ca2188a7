//! Recording adapter for the `SessionService` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::sessions::{
    CreateSessionRequest, SessionDetail, SessionFuture, SessionHandle, SessionService,
};

/// Records session interactions while delegating to an inner implementation.
pub struct RecordingSessionService {
    inner: Box<dyn SessionService>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSessionService {
    /// Creates a new recording session service wrapping the given implementation.
    pub fn new(inner: Box<dyn SessionService>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct SessionInput<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct MessageInput<'a> {
    session_id: &'a str,
    message: &'a str,
}

impl SessionService for RecordingSessionService {
    fn create(&self, request: &CreateSessionRequest) -> SessionFuture<'_, SessionHandle> {
        let request = request.clone();
        Box::pin(async move {
            let result = self.inner.create(&request).await;
            record_result(&self.recorder, "sessions", "create", &request, &result);
            result
        })
    }

    fn detail(&self, session_id: &str) -> SessionFuture<'_, SessionDetail> {
        let session_id = session_id.to_string();
        Box::pin(async move {
            let result = self.inner.detail(&session_id).await;
            let input = SessionInput { session_id: &session_id };
            record_result(&self.recorder, "sessions", "detail", &input, &result);
            result
        })
    }

    fn send_message(&self, session_id: &str, message: &str) -> SessionFuture<'_, ()> {
        let session_id = session_id.to_string();
        let message = message.to_string();
        Box::pin(async move {
            let result = self.inner.send_message(&session_id, &message).await;
            let input = MessageInput { session_id: &session_id, message: &message };
            record_result(&self.recorder, "sessions", "send_message", &input, &result);
            result
        })
    }
}
