//! Command dispatch and handlers.

pub mod analyze;
pub mod serve;

use crate::cli::Command;
use crate::config::Settings;

/// Dispatch a parsed command to its handler.
///
/// Settings come from the environment. When `TRIAGE_RECORD` is set to a
/// file path, all port interactions are recorded to that cassette.
///
/// # Errors
///
/// Returns an error string if the settings are invalid or the selected
/// command handler fails.
pub async fn dispatch(command: &Command) -> Result<(), String> {
    let settings = Settings::from_env()?;
    match command {
        Command::Serve { bind, port } => serve::run(settings, bind, *port).await,
        Command::Analyze { replay } => analyze::run(&settings, replay.as_deref()).await,
    }
}
