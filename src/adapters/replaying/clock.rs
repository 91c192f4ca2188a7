//! Replaying adapter for the Clock port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cassette::replayer::CassetteReplayer;
use crate::ports::clock::{Clock, SleepFuture};

/// Replays recorded clock values from a cassette.
///
/// Sleeping only yields to the runtime, so replayed polling loops finish
/// without waiting out their recorded intervals.
pub struct ReplayingClock {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingClock {
    /// Creates a new replaying clock from a cassette replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl Clock for ReplayingClock {
    fn now(&self) -> DateTime<Utc> {
        let output = {
            let mut replayer = self.replayer.lock().expect("replayer lock poisoned");
            let interaction = replayer.next_interaction("clock", "now");
            interaction.output.clone()
        };
        serde_json::from_value(output).expect("clock::now: failed to deserialize DateTime<Utc>")
    }

    fn sleep(&self, _duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::task::yield_now())
    }
}
