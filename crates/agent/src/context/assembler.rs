//! Conversation assembly: thread replies in, budgeted chat history out.
//!
//! `assemble` is `truncate(convert(fetch_thread(..)))`:
//!
//! 1. **Fetch** every reply of the thread from the chat platform
//! 2. **Convert** replies to role-tagged messages, skipping empty ones
//! 3. **Truncate** from the oldest end until the history fits the budget
//!
//! The preamble is not part of the history and is never counted or dropped.

use crate::context::token::SizeMetric;
use std::sync::Arc;
use threadwise_core::channel::{ChatPlatform, RawMessage};
use threadwise_core::error::{Error, Result};
use threadwise_core::identity::BotIdentity;
use threadwise_core::message::{ChatMessage, Role};
use tracing::debug;

/// Builds the history part of a thread context.
pub struct ConversationAssembler {
    platform: Arc<dyn ChatPlatform>,
    metric: Arc<dyn SizeMetric>,
    identity: BotIdentity,
    budget: usize,
}

impl ConversationAssembler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        metric: Arc<dyn SizeMetric>,
        identity: BotIdentity,
        budget: usize,
    ) -> Self {
        Self {
            platform,
            metric,
            identity,
            budget,
        }
    }

    /// Retrieve every reply of the thread rooted at `thread_ts`.
    pub async fn fetch_thread(&self, channel: &str, thread_ts: &str) -> Result<Vec<RawMessage>> {
        let messages = self
            .platform
            .fetch_replies(channel, thread_ts, None)
            .await
            .map_err(Error::HistoryUnavailable)?;

        if messages.is_empty() {
            return Err(Error::EmptyThread {
                channel: channel.into(),
                thread_ts: thread_ts.into(),
            });
        }
        Ok(messages)
    }

    /// Fetch, convert and truncate the thread history.
    pub async fn assemble(&self, channel: &str, thread_ts: &str) -> Result<Vec<ChatMessage>> {
        let raw = self.fetch_thread(channel, thread_ts).await?;
        let converted = convert(&raw, &self.identity);
        let total = converted.len();
        let kept = truncate(converted, self.budget, self.metric.as_ref())?;

        debug!(
            channel,
            thread_ts,
            fetched = raw.len(),
            kept = kept.len(),
            dropped = total - kept.len(),
            budget = self.budget,
            "Assembled thread history"
        );
        Ok(kept)
    }
}

/// Map thread replies to chat messages.
///
/// Replies with an empty author or empty text are skipped. A reply whose
/// sender matches the bot's `bot_id` becomes `Assistant`, anything else
/// `User`.
pub fn convert(messages: &[RawMessage], identity: &BotIdentity) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|m| !m.user.is_empty() && !m.text.is_empty())
        .map(|m| ChatMessage {
            role: Role::for_author(m.sender(), &identity.bot_id),
            content: m.text.clone(),
            author_id: Some(m.sender().to_string()),
        })
        .collect()
}

/// Keep the longest suffix of `messages` whose total size fits `budget`.
///
/// Walks from the newest message backward. The message that first pushes
/// the running total over the budget, and everything older, is dropped. If
/// the newest message alone is over budget the result is empty.
pub fn truncate<M>(messages: Vec<ChatMessage>, budget: usize, metric: &M) -> Result<Vec<ChatMessage>>
where
    M: SizeMetric + ?Sized,
{
    let mut total = 0usize;
    let mut keep_from = 0usize;

    for (i, message) in messages.iter().enumerate().rev() {
        total = total.saturating_add(metric.measure(&message.content)?);
        if total > budget {
            keep_from = i + 1;
            break;
        }
    }

    if keep_from == 0 {
        return Ok(messages);
    }
    let mut messages = messages;
    Ok(messages.split_off(keep_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token::CharLength;
    use crate::test_helpers::{FetchCall, ScriptedPlatform, bot_identity, thread};
    use threadwise_core::error::ChannelError;

    fn raw(user: &str, bot_id: Option<&str>, text: &str) -> RawMessage {
        RawMessage {
            user: user.into(),
            bot_id: bot_id.map(Into::into),
            text: text.into(),
            ..Default::default()
        }
    }

    fn contents(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    /// Fails on any message containing "boom".
    struct Fussy;

    impl SizeMetric for Fussy {
        fn measure(&self, text: &str) -> Result<usize> {
            if text.contains("boom") {
                Err(Error::EncodingFailure("unencodable".into()))
            } else {
                Ok(text.len())
            }
        }
    }

    fn assembler(platform: ScriptedPlatform, budget: usize) -> ConversationAssembler {
        ConversationAssembler::new(Arc::new(platform), Arc::new(CharLength), bot_identity(), budget)
    }

    // ── convert ──

    #[test]
    fn convert_assigns_roles_by_sender() {
        let history = vec![
            raw("U1", None, "question"),
            raw("UBOT", Some("BBOT"), "answer"),
            raw("U2", Some("BOTHER"), "another bot"),
        ];
        let messages = convert(&history, &bot_identity());
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[1].author_id.as_deref(), Some("BBOT"));
        assert_eq!(messages[0].author_id.as_deref(), Some("U1"));
    }

    #[test]
    fn convert_skips_empty_author_or_text() {
        let history = vec![
            raw("", None, "no author"),
            raw("U1", None, ""),
            raw("U1", None, "kept"),
        ];
        assert_eq!(contents(&convert(&history, &bot_identity())), ["kept"]);
    }

    #[test]
    fn convert_preserves_order() {
        let history: Vec<_> = (0..5).map(|i| raw("U1", None, &format!("m{i}"))).collect();
        assert_eq!(
            contents(&convert(&history, &bot_identity())),
            ["m0", "m1", "m2", "m3", "m4"]
        );
    }

    // ── truncate ──

    #[test]
    fn under_budget_is_unchanged() {
        let messages = vec![ChatMessage::user("abc"), ChatMessage::assistant("de")];
        let kept = truncate(messages.clone(), 5, &CharLength).unwrap();
        assert_eq!(kept, messages);

        let again = truncate(kept.clone(), 5, &CharLength).unwrap();
        assert_eq!(again, kept);
    }

    #[test]
    fn drops_oldest_first() {
        let messages: Vec<_> = ["aaaa", "bbbb", "cccc", "dddd", "eeee"]
            .into_iter()
            .map(ChatMessage::user)
            .collect();
        let kept = truncate(messages, 12, &CharLength).unwrap();
        assert_eq!(contents(&kept), ["cccc", "dddd", "eeee"]);
    }

    #[test]
    fn result_is_suffix_within_budget() {
        let messages: Vec<_> = ["x", "yyyyyy", "zz", "wwww", "v"]
            .into_iter()
            .map(ChatMessage::user)
            .collect();
        for budget in 0..16 {
            let kept = truncate(messages.clone(), budget, &CharLength).unwrap();
            let total: usize = kept.iter().map(|m| m.content.len()).sum();
            assert!(total <= budget, "budget {budget} exceeded");
            assert!(messages.ends_with(&kept), "budget {budget} not a suffix");

            // Maximal: one more older message would not fit.
            if kept.len() < messages.len() {
                let next = &messages[messages.len() - kept.len() - 1];
                assert!(total + next.content.len() > budget);
            }
        }
    }

    #[test]
    fn exact_fit_is_kept() {
        let messages = vec![ChatMessage::user("abc"), ChatMessage::user("de")];
        assert_eq!(truncate(messages, 5, &CharLength).unwrap().len(), 2);
    }

    #[test]
    fn oversized_newest_message_yields_empty() {
        let messages = vec![ChatMessage::user("ok"), ChatMessage::user("far too long")];
        let kept = truncate(messages, 5, &CharLength).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(truncate(Vec::new(), 10, &CharLength).unwrap().is_empty());
    }

    #[test]
    fn metric_failure_propagates() {
        let messages = vec![ChatMessage::user("boom"), ChatMessage::user("fine")];
        let err = truncate(messages, 100, &Fussy).unwrap_err();
        assert!(matches!(err, Error::EncodingFailure(_)));
    }

    #[test]
    fn metric_failure_on_dropped_message_is_not_reached() {
        // The walk stops at the first message over budget; older ones are
        // never measured.
        let messages = vec![ChatMessage::user("boom"), ChatMessage::user("123456")];
        let kept = truncate(messages, 3, &Fussy).unwrap();
        assert!(kept.is_empty());
    }

    // ── fetch / assemble ──

    #[tokio::test]
    async fn fetch_reads_whole_thread() {
        let platform = ScriptedPlatform::new(thread("1.0", &[("U1", "hi"), ("U2", "hello")]));
        let messages = assembler(platform, 100)
            .fetch_thread("C1", "1.0")
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn empty_thread_is_an_error() {
        let err = assembler(ScriptedPlatform::new(Vec::new()), 100)
            .fetch_thread("C1", "1.0")
            .await
            .unwrap_err();
        match err {
            Error::EmptyThread { channel, thread_ts } => {
                assert_eq!(channel, "C1");
                assert_eq!(thread_ts, "1.0");
            }
            other => panic!("Expected EmptyThread, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn platform_failure_is_history_unavailable() {
        let platform = ScriptedPlatform::new(Vec::new()).failing_fetch(ChannelError::Api {
            method: "conversations.replies".into(),
            error: "thread_not_found".into(),
        });
        let err = assembler(platform, 100)
            .fetch_thread("C1", "1.0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HistoryUnavailable(_)));
    }

    #[tokio::test]
    async fn assemble_converts_and_truncates() {
        let messages = thread(
            "1.0",
            &[("U1", "aaaa"), ("UBOT", "bbbb"), ("", "joined"), ("U1", "cccc")],
        );
        let history = assembler(ScriptedPlatform::new(messages), 8)
            .assemble("C1", "1.0")
            .await
            .unwrap();
        assert_eq!(contents(&history), ["bbbb", "cccc"]);
        assert_eq!(history[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn assemble_requests_full_thread() {
        let platform = Arc::new(ScriptedPlatform::new(thread("9.9", &[("U1", "hi")])));
        let assembler =
            ConversationAssembler::new(platform.clone(), Arc::new(CharLength), bot_identity(), 100);
        assembler.assemble("C7", "9.9").await.unwrap();
        assert_eq!(
            platform.fetches(),
            [FetchCall {
                channel: "C7".into(),
                ts: "9.9".into(),
                limit: None,
            }]
        );
    }
}
