//! `triage serve` command.

use std::sync::Arc;

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::server::{self, AppState, ServeConfig};
use crate::store::TriageStore;

/// Execute the `serve` command.
///
/// # Errors
///
/// Returns an error string if the server cannot bind or fails while running.
pub async fn run(settings: Settings, bind: &str, port: u16) -> Result<(), String> {
    if settings.analysis_api_key.is_none() {
        tracing::warn!("ANALYSIS_API_KEY is not set; analysis and chat requests will fail");
    }
    tracing::info!(repo = %settings.repo, "serving triage dashboard API");

    let state = AppState {
        ctx: Arc::new(ServiceContext::from_settings(&settings)),
        store: Arc::new(TriageStore::new()),
        settings: Arc::new(settings),
    };
    server::serve(state, ServeConfig { bind: bind.to_string(), port }).await
}
