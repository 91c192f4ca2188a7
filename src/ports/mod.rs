//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system (time, the issue tracker, the analysis service).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod issues;
pub mod sessions;

pub use clock::{Clock, SleepFuture};
pub use issues::{IssueFuture, IssueSource, Label, RawIssue};
pub use sessions::{
    CreateSessionRequest, SessionDetail, SessionFuture, SessionHandle, SessionMessage,
    SessionService,
};
