//! The bot's own identity on the chat platform.

use serde::{Deserialize, Serialize};

/// Identifiers the platform uses for this bot.
///
/// Slack reports both: `bot_id` is attached to messages the app posts,
/// `user_id` is the bot user that gets mentioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// App/bot process identifier (Slack `B...`)
    pub bot_id: String,

    /// Bot user identifier (Slack `U...`)
    pub user_id: String,
}

impl BotIdentity {
    pub fn new(bot_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Whether an event sender is the bot itself.
    ///
    /// Matches on either identifier. Empty identifiers never match.
    pub fn is_self(&self, bot_id: Option<&str>, user_id: &str) -> bool {
        let bot_match = bot_id.is_some_and(|id| !id.is_empty() && id == self.bot_id);
        let user_match = !user_id.is_empty() && user_id == self.user_id;
        bot_match || user_match
    }
}
