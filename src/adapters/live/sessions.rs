//! Live adapter for the `SessionService` port using the Devin v1 sessions API.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::ports::sessions::{
    CreateSessionRequest, SessionDetail, SessionFuture, SessionHandle, SessionService,
};

/// Default endpoint of the analysis service.
pub const ANALYSIS_API_BASE: &str = "https://api.devin.ai/v1";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Live session client that calls the analysis service over HTTPS.
pub struct LiveSessionService {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl LiveSessionService {
    /// Creates a new live session client.
    ///
    /// Without an API key every call fails with a configuration error.
    #[must_use]
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BoxError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| -> BoxError { "ANALYSIS_API_KEY not configured".into() })?;
        Ok(builder.bearer_auth(key))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, BoxError> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|e| -> BoxError { format!("Analysis API request failed: {e}").into() })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| -> BoxError {
            format!("Failed to read analysis API response: {e}").into()
        })?;

        if !status.is_success() {
            let msg = serde_json::from_str::<ApiError>(&text)
                .ok()
                .and_then(ApiError::into_message)
                .unwrap_or(text);
            return Err(format!("Analysis API error ({}): {msg}", status.as_u16()).into());
        }
        Ok(text)
    }
}

/// Request body for posting a message to a session.
#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// Error body returned by the analysis service.
#[derive(Deserialize)]
struct ApiError {
    detail: Option<String>,
    message: Option<String>,
}

impl ApiError {
    fn into_message(self) -> Option<String> {
        self.detail.or(self.message)
    }
}

fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, BoxError> {
    serde_json::from_str(text)
        .map_err(|e| -> BoxError { format!("Failed to parse analysis API response: {e}").into() })
}

impl SessionService for LiveSessionService {
    fn create(&self, request: &CreateSessionRequest) -> SessionFuture<'_, SessionHandle> {
        let request = request.clone();
        Box::pin(async move {
            let builder =
                self.client.post(format!("{}/sessions", self.api_base)).json(&request);
            let text = self.send(builder).await?;
            parse(&text)
        })
    }

    fn detail(&self, session_id: &str) -> SessionFuture<'_, SessionDetail> {
        let url = format!("{}/sessions/{session_id}", self.api_base);
        Box::pin(async move {
            let text = self.send(self.client.get(url)).await?;
            parse(&text)
        })
    }

    fn send_message(&self, session_id: &str, message: &str) -> SessionFuture<'_, ()> {
        let url = format!("{}/sessions/{session_id}/message", self.api_base);
        let message = message.to_string();
        Box::pin(async move {
            let builder = self.client.post(url).json(&MessageBody { message: &message });
            self.send(builder).await?;
            Ok(())
        })
    }
}
