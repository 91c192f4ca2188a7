//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::issues::LiveIssueSource;
use crate::adapters::live::sessions::LiveSessionService;
use crate::adapters::recording::{RecordingClock, RecordingIssueSource, RecordingSessionService};
use crate::adapters::replaying::{ReplayingClock, ReplayingIssueSource, ReplayingSessionService};
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::config::Settings;
use crate::ports::clock::Clock;
use crate::ports::issues::IssueSource;
use crate::ports::sessions::SessionService;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, replaying, recording).
pub struct ServiceContext {
    /// Clock for timestamps and poll delays.
    pub clock: Box<dyn Clock>,
    /// Issue tracker the triaged issues come from.
    pub issues: Box<dyn IssueSource>,
    /// Remote analysis session service.
    pub sessions: Box<dyn SessionService>,
    /// Optional cassette recorder; saved on drop.
    recorder: Option<Arc<Mutex<CassetteRecorder>>>,
}

impl ServiceContext {
    /// Creates a live context talking to GitHub and the analysis service.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        let (clock, issues, sessions) = live_ports(settings);
        Self { clock, issues, sessions, recorder: None }
    }

    /// Creates a recording context that writes a cassette file on drop.
    ///
    /// Uses live adapters for actual work. This is the developer-only
    /// mechanism for capturing cassettes via the `TRIAGE_RECORD` env var.
    #[must_use]
    pub fn recording(settings: &Settings, path: &Path) -> Self {
        let (clock, issues, sessions) = live_ports(settings);
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            "triage-session",
            settings.repo.to_string(),
        )));

        Self {
            clock: Box::new(RecordingClock::new(clock, Arc::clone(&recorder))),
            issues: Box::new(RecordingIssueSource::new(issues, Arc::clone(&recorder))),
            sessions: Box::new(RecordingSessionService::new(sessions, Arc::clone(&recorder))),
            recorder: Some(recorder),
        }
    }

    /// Creates a replaying context from a cassette file.
    ///
    /// All ports are served by a single cassette; each port/method pair
    /// is dispatched to its own interaction stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be read or parsed.
    pub fn replaying(path: &Path) -> Result<Self, String> {
        let replayer = Arc::new(Mutex::new(CassetteReplayer::load(path)?));
        Ok(Self {
            clock: Box::new(ReplayingClock::new(Arc::clone(&replayer))),
            issues: Box::new(ReplayingIssueSource::new(Arc::clone(&replayer))),
            sessions: Box::new(ReplayingSessionService::new(replayer)),
            recorder: None,
        })
    }

    /// Picks the live or recording context depending on `settings.record_path`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.record_path {
            Some(path) => Self::recording(settings, path),
            None => Self::live(settings),
        }
    }

    /// Writes the cassette of a recording context now.
    ///
    /// Does nothing for live and replaying contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be written.
    pub fn save_recording(&self) -> Result<(), String> {
        let Some(recorder) = &self.recorder else {
            return Ok(());
        };
        let guard = recorder.lock().map_err(|_| "recorder lock poisoned".to_string())?;
        let path = guard
            .save()
            .map_err(|e| format!("Failed to write cassette {}: {e}", guard.path().display()))?;
        tracing::info!(path = %path.display(), interactions = guard.len(), "cassette saved");
        Ok(())
    }
}

type LivePorts = (Box<dyn Clock>, Box<dyn IssueSource>, Box<dyn SessionService>);

fn live_ports(settings: &Settings) -> LivePorts {
    (
        Box::new(LiveClock),
        Box::new(LiveIssueSource::new(
            settings.github_api_base.clone(),
            settings.repo.clone(),
            settings.github_token.clone(),
        )),
        Box::new(LiveSessionService::new(
            settings.analysis_api_base.clone(),
            settings.analysis_api_key.clone(),
        )),
    )
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        if let Err(e) = self.save_recording() {
            tracing::warn!(error = %e, "failed to write cassette");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use chrono::Utc;
    use serde_json::json;

    fn write_cassette(path: &Path, interactions: Vec<Interaction>) {
        let cassette = Cassette {
            name: "test".into(),
            recorded_at: Utc::now(),
            repo: "acme/widgets".into(),
            interactions,
        };
        let yaml = serde_yaml::to_string(&cassette).unwrap();
        std::fs::write(path, yaml).unwrap();
    }

    #[tokio::test]
    async fn replaying_context_serves_every_port() {
        let dir = std::env::temp_dir().join("triage_ctx_test_replay");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("full.cassette.yaml");

        write_cassette(
            &path,
            vec![
                Interaction {
                    seq: 0,
                    port: "clock".into(),
                    method: "now".into(),
                    input: json!({}),
                    output: json!("2024-06-15T10:30:00Z"),
                },
                Interaction {
                    seq: 1,
                    port: "issues".into(),
                    method: "list_open".into(),
                    input: json!({"max": 400}),
                    output: json!({"ok": []}),
                },
                Interaction {
                    seq: 2,
                    port: "sessions".into(),
                    method: "create".into(),
                    input: json!({"prompt": "p"}),
                    output: json!({"ok": {"session_id": "s-1", "status": "running", "url": "u"}}),
                },
            ],
        );

        let ctx = ServiceContext::replaying(&path).unwrap();
        assert_eq!(ctx.clock.now().to_rfc3339(), "2024-06-15T10:30:00+00:00");
        assert!(ctx.issues.list_open(400).await.unwrap().is_empty());
        let request = crate::ports::CreateSessionRequest {
            prompt: "p".into(),
            structured_output_schema: None,
            idempotent: None,
        };
        assert_eq!(ctx.sessions.create(&request).await.unwrap().session_id, "s-1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replaying_missing_cassette_errors() {
        let result = ServiceContext::replaying(Path::new("/nonexistent/x.cassette.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn recording_context_writes_cassette_on_drop() {
        let dir = std::env::temp_dir().join("triage_ctx_test_record");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("run.cassette.yaml");

        {
            let ctx = ServiceContext::recording(&Settings::default(), &path);
            let _ = ctx.clock.now();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let cassette: Cassette = serde_yaml::from_str(&content).unwrap();
        assert_eq!(cassette.interactions.len(), 1);
        assert_eq!(cassette.interactions[0].port, "clock");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_save_names_the_cassette_path() {
        let dir = std::env::temp_dir().join("triage_ctx_test_unwritable");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("run.cassette.yaml");

        let ctx = ServiceContext::recording(&Settings::default(), &path);
        let err = ctx.save_recording().unwrap_err();

        assert!(err.contains("Failed to write cassette"));
        assert!(err.contains(&path.display().to_string()));
        drop(ctx);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
