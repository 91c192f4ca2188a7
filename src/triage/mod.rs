//! Issue analysis: extracting results from sessions, merging them with the
//! fetched issues and driving a whole run.

pub mod chat;
pub mod extract;
pub mod feature;
pub mod merge;
pub mod model;
pub mod poll;
pub mod run;
