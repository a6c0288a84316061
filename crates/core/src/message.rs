//! Message and thread context domain types.
//!
//! These are the value objects that flow through the system:
//! Slack thread → [`ChatMessage`] sequence → [`ThreadContext`] → completion provider.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human in the thread
    User,
    /// The bot's own earlier replies
    Assistant,
    /// The fixed preamble
    System,
}

impl Role {
    /// Classify a thread message author relative to the bot.
    ///
    /// Messages sent by the bot itself become `Assistant`, everything else
    /// becomes `User`. `System` is never derived from an author.
    pub fn for_author(author: &str, bot_identity: &str) -> Self {
        if author == bot_identity {
            Self::Assistant
        } else {
            Self::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Platform user ID of the author, when the message came from a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl ChatMessage {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            author_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            author_id: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            author_id: None,
        }
    }
}

/// The exact message sequence sent to the completion endpoint.
///
/// Always starts with the system preamble, followed by the (already
/// truncated) thread history in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContext {
    messages: Vec<ChatMessage>,
}

impl ThreadContext {
    /// Build a context from a preamble and the assembled history.
    pub fn new(preamble: ChatMessage, history: Vec<ChatMessage>) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(preamble);
        messages.extend(history);
        Self { messages }
    }

    /// Append `content` as a final user message unless the last entry
    /// already carries exactly that content.
    ///
    /// Returns `true` if the message was appended.
    pub fn push_user_unless_last(&mut self, content: &str) -> bool {
        if self.last().is_some_and(|m| m.content == content) {
            return false;
        }
        self.messages.push(ChatMessage::user(content));
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
