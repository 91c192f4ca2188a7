//! Replaying adapters that replay recorded interactions.

pub mod clock;
pub mod issues;
pub mod sessions;

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;

pub use clock::ReplayingClock;
pub use issues::ReplayingIssueSource;
pub use sessions::ReplayingSessionService;

/// Take the next recorded output for a port/method pair.
///
/// Exhaustion becomes an `{"err": ...}` output so fallible ports surface it
/// as an ordinary error instead of aborting the caller.
pub(crate) fn next_output(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> serde_json::Value {
    let mut guard = replayer.lock().expect("replayer lock poisoned");
    match guard.try_next_interaction(port, method) {
        Ok(interaction) => interaction.output.clone(),
        Err(message) => serde_json::json!({ "err": message }),
    }
}

/// Decode a recorded `Result` using the `{"ok": v}` / `{"err": msg}` convention.
///
/// # Errors
///
/// Returns the recorded error message, or a decoding error if the output
/// does not follow the convention.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: serde_json::Value,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(message) = output.get("err") {
        let message = message.as_str().map_or_else(|| message.to_string(), String::from);
        return Err(message.into());
    }
    let Some(value) = output.get("ok") else {
        return Err(format!("Recorded output is neither ok nor err: {output}").into());
    };
    serde_json::from_value(value.clone())
        .map_err(|e| format!("Failed to decode recorded output: {e}").into())
}
