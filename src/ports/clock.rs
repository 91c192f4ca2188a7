//! Clock port for obtaining the current time and waiting between polls.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Boxed future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Provides the current time and a way to wait.
///
/// Abstracting time access allows deterministic replay by substituting
/// a recorded clock during tests and cassette playback, and lets polling
/// loops run without real delays.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Waits for the given duration.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}
