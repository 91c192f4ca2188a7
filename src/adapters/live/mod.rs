//! Live adapters for real external interactions.

pub mod clock;
pub mod issues;
pub mod sessions;
