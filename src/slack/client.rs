use crate::config::SlackConfig;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum SlackError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unsuccessful status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("chat.postMessage rejected: {0}")]
    Api(String),
    #[error("Invalid chat.postMessage response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReply {
    pub channel: String,
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    ok: bool,

    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    post_message_url: String,
    bot_token: String,
}
impl SlackClient {
    pub fn new(config: &SlackConfig, bot_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("legalbot"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .context("Failed to build Slack HTTP client")?;

        Ok(Self {
            http,
            post_message_url: format!("{}/chat.postMessage", config.api_base.trim_end_matches('/')),
            bot_token: bot_token.to_string(),
        })
    }

    /// Posts a message. Only an `ok: true` answer counts as delivered.
    pub async fn post_message(&self, reply: &OutboundReply) -> Result<(), SlackError> {
        debug!("Posting reply to channel {}", reply.channel);
        let response = self
            .http
            .post(&self.post_message_url)
            .bearer_auth(&self.bot_token)
            .json(reply)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SlackError::Status { status, body });
        }

        let parsed: PostMessageResponse = serde_json::from_str(&body)?;
        if parsed.ok {
            Ok(())
        } else {
            Err(SlackError::Api(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: String) -> SlackClient {
        let config = SlackConfig {
            api_base: format!("{base_url}/api/"),
            request_timeout_secs: 2,
        };
        SlackClient::new(&config, "xoxb-test").unwrap()
    }

    fn reply(thread_ts: Option<&str>) -> OutboundReply {
        OutboundReply {
            channel: "C1".to_string(),
            text: "hello".to_string(),
            thread_ts: thread_ts.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_post_message_threads_reply() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat.postMessage")
                .header("authorization", "Bearer xoxb-test")
                .json_body(json!({ "channel": "C1", "text": "hello", "thread_ts": "1.1" }));
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C1", "ts": "1.2" }));
        });

        client(server.base_url())
            .post_message(&reply(Some("1.1")))
            .await
            .unwrap();
        post.assert_calls(1);
    }

    #[tokio::test]
    async fn test_post_message_without_thread_omits_field() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat.postMessage")
                .json_body(json!({ "channel": "C1", "text": "hello" }));
            then.status(200).json_body(json!({ "ok": true }));
        });

        client(server.base_url())
            .post_message(&reply(None))
            .await
            .unwrap();
        post.assert_calls(1);
    }

    #[tokio::test]
    async fn test_post_message_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat.postMessage");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "channel_not_found" }));
        });

        let err = client(server.base_url())
            .post_message(&reply(Some("1.1")))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Api(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn test_post_message_status_and_decode_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat.postMessage");
            then.status(500).body("upstream exploded");
        });
        let err = client(server.base_url())
            .post_message(&reply(None))
            .await
            .unwrap_err();
        assert!(
            matches!(err, SlackError::Status { status, ref body } if status == StatusCode::INTERNAL_SERVER_ERROR && body == "upstream exploded")
        );

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat.postMessage");
            then.status(200).body("<html>not json</html>");
        });
        let err = client(server.base_url())
            .post_message(&reply(None))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Decode(_)));
    }
}
