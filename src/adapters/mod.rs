//! Adapter implementations of the port traits.
//!
//! - `live`: talks to GitHub, the analysis service and the system clock.
//! - `recording`: wraps live adapters and captures every interaction.
//! - `replaying`: serves interactions back from a cassette.

pub mod live;
pub mod recording;
pub mod replaying;
