use crate::config::CompletionConfig;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unsuccessful status {status}: {payload}")]
    Status { status: StatusCode, payload: Value },
    /// A 2xx document carrying a non-null `error` member. Holds the whole document, which
    /// may still contain answer text.
    #[error("Upstream error payload: {0}")]
    Upstream(Value),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct InputMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub input: [InputMessage<'a>; 2],
}
impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, system_instruction: &'a str, user_text: &'a str) -> Self {
        Self {
            model,
            input: [
                InputMessage {
                    role: "system",
                    content: system_instruction,
                },
                InputMessage {
                    role: "user",
                    content: user_text,
                },
            ],
        }
    }
}

/// Responses API client. No request timeout is set; the HTTP client defaults apply.
#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}
impl CompletionClient {
    pub fn new(config: &CompletionConfig, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }

    /// Returns the raw response document. Its shape is not trusted, see
    /// [`super::extract_response_text`].
    pub async fn complete(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<Value, CompletionError> {
        let request = CompletionRequest::new(&self.model, system_instruction, user_text);

        debug!("Sending completion request with model {}", self.model);
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let payload =
                serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.clone()));
            return Err(CompletionError::Status { status, payload });
        }

        let payload: Value = serde_json::from_str(&body)?;
        match payload.get("error") {
            Some(error) if !error.is_null() => Err(CompletionError::Upstream(payload)),
            _ => Ok(payload),
        }
    }
}
