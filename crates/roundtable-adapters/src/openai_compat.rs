//! OpenAI-compatible chat completion backend.

use async_trait::async_trait;
use roundtable_proto::{BackendError, ChatBackend, ChatMessage, ChatRequest};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Builds the HTTP client shared by the backend and the probe.
pub fn build_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if !request_timeout.is_zero() {
        builder = builder.timeout(request_timeout);
    }
    builder.build()
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Talks to `{base_url}/chat/completions` with a bearer credential.
///
/// Each request carries its own endpoint, so one backend serves participants
/// on different models or servers.
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Creates a backend with a fresh client. A zero timeout means none.
    pub fn new(request_timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self::with_client(build_client(request_timeout)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let endpoint = &request.endpoint;
        let url = join_url(&endpoint.base_url, "chat/completions");
        let body = CompletionBody {
            model: &endpoint.model,
            messages: &request.messages,
        };

        debug!(
            agent = %request.agent,
            model = %endpoint.model,
            messages = request.messages.len(),
            "Sending completion request"
        );
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BackendError::Transport {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            warn!(agent = %request.agent, status = status.as_u16(), "Completion request rejected");
            return Err(BackendError::Status {
                endpoint: url,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(BackendError::EmptyResponse { endpoint: url })?;

        debug!(
            agent = %request.agent,
            chars = content.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(content)
    }
}
