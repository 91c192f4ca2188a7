//! Recording adapter for the Clock port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::record_interaction;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::clock::{Clock, SleepFuture};

/// Records clock readings while delegating to an inner clock.
///
/// Sleeps are passed through and not recorded.
pub struct RecordingClock {
    inner: Box<dyn Clock>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingClock {
    /// Creates a new recording clock wrapping the given implementation.
    pub fn new(inner: Box<dyn Clock>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        record_interaction(&self.recorder, "clock", "now", &serde_json::json!({}), &now);
        now
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        self.inner.sleep(duration)
    }
}
