//! HTTP client for the remote workflow backend.
//!
//! The backend is an opaque collaborator reachable through three webhook
//! endpoints: one for text messages, one for recorded audio, and one that is
//! polled for asynchronously pushed replies. No authentication beyond the
//! client-chosen user id, no retries.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::ChatConfig;

pub struct WebhookClient {
    http: reqwest::Client,
    config: ChatConfig,
}

/// Shape of the polled updates payload: `{ "output"?: string }`
#[derive(Debug, Deserialize)]
struct UpdatePayload {
    output: Option<String>,
}

impl WebhookClient {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// POST a text message to the backend and return the reply text.
    pub async fn send_text(&self, message: &str) -> Result<String> {
        let body = serde_json::json!({
            "userId": self.config.user_id,
            "message": message,
        });

        let response = self
            .http
            .post(&self.config.text_endpoint)
            .json(&body)
            .send()
            .await
            .context("Failed to reach text webhook")?;

        Self::read_reply(response).await
    }

    /// POST a finalized recording as multipart form data and return the
    /// reply text. The payload travels as a `file` part with an `audio/wav`
    /// content type, alongside a `userId` text part.
    pub async fn send_audio(&self, wav: Vec<u8>, file_name: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .context("Invalid audio content type")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("userId", self.config.user_id.clone());

        let response = self
            .http
            .post(&self.config.audio_endpoint)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach audio webhook")?;

        Self::read_reply(response).await
    }

    /// GET the updates endpoint for an asynchronously pushed reply.
    ///
    /// Returns `Ok(None)` when there is nothing pending; an empty output
    /// string counts as nothing pending.
    pub async fn fetch_updates(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(&self.config.updates_endpoint)
            .query(&[("userId", self.config.user_id.as_str())])
            .send()
            .await
            .context("Failed to reach updates webhook")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Updates webhook returned {}: {}", status, body);
        }

        let payload: UpdatePayload = response
            .json()
            .await
            .context("Malformed updates payload")?;

        Ok(payload.output.filter(|text| !text.is_empty()))
    }

    async fn read_reply(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read webhook reply body")?;

        if !status.is_success() {
            bail!("Webhook returned {}: {}", status, body);
        }

        parse_reply(&body)
    }
}

/// Parse a webhook reply body into the reply text.
///
/// The backend answers in one of three shapes: a JSON object
/// `{ "output": "..." }`, a bare JSON string, or a raw text body. A JSON
/// object without a string `output` field is malformed.
pub fn parse_reply(body: &str) -> Result<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map
            .get("output")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .with_context(|| format!("Reply object has no string `output` field: {}", body)),
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => bail!("Unexpected reply payload: {}", other),
        // Not JSON at all: the backend answered with a bare text body
        Err(_) => Ok(body.to_string()),
    }
}
