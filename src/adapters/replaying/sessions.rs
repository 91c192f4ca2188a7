//! Replaying adapter for the `SessionService` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::sessions::{
    CreateSessionRequest, SessionDetail, SessionFuture, SessionHandle, SessionService,
};

/// Serves recorded session responses from a cassette.
pub struct ReplayingSessionService {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingSessionService {
    /// Create a replaying session service backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl SessionService for ReplayingSessionService {
    fn create(&self, _request: &CreateSessionRequest) -> SessionFuture<'_, SessionHandle> {
        let output = next_output(&self.replayer, "sessions", "create");
        Box::pin(async move { replay_result(output) })
    }

    fn detail(&self, _session_id: &str) -> SessionFuture<'_, SessionDetail> {
        let output = next_output(&self.replayer, "sessions", "detail");
        Box::pin(async move { replay_result(output) })
    }

    fn send_message(&self, _session_id: &str, _message: &str) -> SessionFuture<'_, ()> {
        let output = next_output(&self.replayer, "sessions", "send_message");
        Box::pin(async move { replay_result(output) })
    }
}
