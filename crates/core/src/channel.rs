//! Chat platform traits: the abstraction over Slack (or any team chat).
//!
//! A [`ChatPlatform`] answers history lookups and accepts replies. An
//! [`EventSource`] produces the inbound event stream. The Slack adapter
//! implements both; tests implement them in memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::event::BotEvent;
use crate::identity::BotIdentity;

/// A thread message as returned by the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Platform user ID of the author (empty for some system artifacts)
    #[serde(default)]
    pub user: String,

    /// Bot ID when the message was posted by an app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,

    /// The text content
    #[serde(default)]
    pub text: String,

    /// Message timestamp (doubles as the message ID)
    #[serde(default)]
    pub ts: String,

    /// Parent thread timestamp, if the message lives in a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl RawMessage {
    /// The identity used to decide the message role: the bot ID for app
    /// messages, the user ID otherwise.
    pub fn sender(&self) -> &str {
        match self.bot_id.as_deref() {
            Some(bot_id) if !bot_id.is_empty() => bot_id,
            _ => &self.user,
        }
    }

    /// The timestamp of the thread this message belongs to.
    pub fn thread_root(&self) -> &str {
        first_non_empty(&[self.thread_ts.as_deref().unwrap_or_default(), &self.ts])
    }
}

/// Return the first non-empty string, or `""` if all are empty.
pub fn first_non_empty<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .copied()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Request/response operations against the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Human-readable platform name (e.g., "slack").
    fn name(&self) -> &str;

    /// Fetch the replies of the thread rooted at `ts` in `channel`,
    /// oldest first. `limit` caps the number of messages returned.
    async fn fetch_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RawMessage>, ChannelError>;

    /// Post `text` to `channel`, inside the thread `thread_ts` if given.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Resolve the bot's own identity.
    async fn identity(&self) -> Result<BotIdentity, ChannelError>;
}

/// Producer of the inbound event stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Start listening for events.
    ///
    /// Returns a receiver that yields events until the source shuts down.
    /// Connection handling (sockets, reconnects, acknowledgements) happens
    /// inside the implementation.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<BotEvent>, ChannelError>;
}
