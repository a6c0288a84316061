//! Inbound events: what the chat platform tells the bot.
//!
//! The Slack listener translates Socket Mode envelopes into [`BotEvent`]s;
//! the dispatcher consumes them. Connection lifecycle is part of the same
//! stream so it can be logged in one place.

use serde::{Deserialize, Serialize};

use crate::channel::first_non_empty;

/// All events the dispatcher may receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BotEvent {
    /// The bot user was mentioned
    Mention(MentionEvent),

    /// A reaction was added to some item
    ReactionAdded(ReactionEvent),

    /// A user joined a channel the bot is in
    MemberJoined(MemberJoinedEvent),

    /// The listener is opening a connection
    Connecting,

    /// The connection is established and events will flow
    Connected,

    /// Opening or keeping the connection failed; the listener will retry
    ConnectionError { reason: String },

    /// The platform asked us to reconnect, or the socket closed
    Disconnected { reason: String },
}

impl BotEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mention(_) => "mention",
            Self::ReactionAdded(_) => "reaction_added",
            Self::MemberJoined(_) => "member_joined",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ConnectionError { .. } => "connection_error",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

/// An `app_mention` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEvent {
    pub channel: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    pub text: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl MentionEvent {
    /// The thread to read and reply in: the enclosing thread when the
    /// mention was posted inside one, otherwise the mention itself.
    pub fn thread_root(&self) -> &str {
        first_non_empty(&[self.thread_ts.as_deref().unwrap_or_default(), &self.ts])
    }
}

/// A `reaction_added` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Who added the reaction
    pub user: String,

    /// Reaction name without colons (e.g. "eyes")
    pub reaction: String,

    /// Item type: "message", "file", ...
    pub item_type: String,

    /// Channel of the reacted-to item
    pub item_channel: String,

    /// Timestamp of the reacted-to item
    pub item_ts: String,
}

impl ReactionEvent {
    pub fn targets_message(&self) -> bool {
        self.item_type == "message"
    }
}

/// A `member_joined_channel` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoinedEvent {
    pub user: String,
    pub channel: String,
}
