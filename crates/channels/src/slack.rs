//! Slack Web API client.
//!
//! Implements [`ChatPlatform`] over `conversations.replies`,
//! `chat.postMessage` and `auth.test`, and opens Socket Mode URLs through
//! `apps.connections.open`. Calls are not retried; a failed call surfaces
//! as a [`ChannelError`] for the caller to log.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use threadwise_config::SlackConfig;
use threadwise_core::channel::{ChatPlatform, RawMessage};
use threadwise_core::error::ChannelError;
use threadwise_core::identity::BotIdentity;
use tracing::debug;

/// Page size used when following `conversations.replies` cursors.
const REPLIES_PAGE_SIZE: usize = 200;

/// Slack Web API client.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.trim().to_string(),
            app_token: config.app_token.trim().to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Call `auth.test` with the bot token.
    pub async fn auth_test(&self) -> Result<BotIdentity, ChannelError> {
        let request = self.http.post(self.url("auth.test")).bearer_auth(&self.bot_token);
        let response: AuthTestResponse = self.send("auth.test", request).await?;
        Ok(BotIdentity::new(
            response.bot_id.unwrap_or_default(),
            response.user_id.unwrap_or_default(),
        ))
    }

    /// Ask Slack for a fresh Socket Mode WebSocket URL (app token).
    pub async fn open_socket_url(&self) -> Result<String, ChannelError> {
        let method = "apps.connections.open";
        let request = self.http.post(self.url(method)).bearer_auth(&self.app_token);
        let response: OpenConnectionResponse = self.send(method, request).await?;
        response
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ChannelError::InvalidPayload(format!("{method} did not return url")))
    }

    async fn send<T>(&self, method: &str, request: reqwest::RequestBuilder) -> Result<T, ChannelError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Network(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Http {
                method: method.into(),
                status: status.as_u16(),
            });
        }

        let envelope: SlackEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))?;

        if !envelope.ok {
            return Err(ChannelError::Api {
                method: method.into(),
                error: envelope.error.unwrap_or_else(|| "unknown_error".into()),
            });
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    async fn fetch_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RawMessage>, ChannelError> {
        let method = "conversations.replies";
        let page_size = limit.unwrap_or(REPLIES_PAGE_SIZE).max(1);
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("ts", ts.to_string()),
                ("limit", page_size.to_string()),
            ];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let request = self
                .http
                .get(self.url(method))
                .bearer_auth(&self.bot_token)
                .query(&query);
            let page: RepliesResponse = self.send(method, request).await?;
            messages.extend(page.messages);

            if let Some(limit) = limit {
                messages.truncate(limit);
                break;
            }

            cursor = page
                .response_metadata
                .map(|meta| meta.next_cursor)
                .filter(|next| !next.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        debug!(channel, ts, count = messages.len(), "Fetched thread replies");
        Ok(messages)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChannelError> {
        let method = "chat.postMessage";
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts.filter(|ts| !ts.is_empty()) {
            payload["thread_ts"] = json!(thread_ts);
        }

        let request = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .json(&payload);
        let _: PostMessageResponse = self.send(method, request).await?;
        Ok(())
    }

    async fn identity(&self) -> Result<BotIdentity, ChannelError> {
        self.auth_test().await
    }
}

// --- Slack API types (internal) ---

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    #[allow(dead_code)]
    ts: Option<String>,
}
