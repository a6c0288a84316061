//! Shared test helpers: an in-memory chat platform and a scripted provider.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use threadwise_core::channel::{ChatPlatform, RawMessage};
use threadwise_core::error::{ChannelError, ProviderError};
use threadwise_core::identity::BotIdentity;
use threadwise_core::provider::{Completion, CompletionRequest, Provider};

pub const BOT_ID: &str = "BBOT";
pub const BOT_USER: &str = "UBOT";

pub fn bot_identity() -> BotIdentity {
    BotIdentity::new(BOT_ID, BOT_USER)
}

/// A thread reply. The bot's own replies carry its `bot_id`.
pub fn reply(user: &str, text: &str, ts: &str, thread_ts: &str) -> RawMessage {
    RawMessage {
        user: user.into(),
        bot_id: (user == BOT_USER).then(|| BOT_ID.to_string()),
        text: text.into(),
        ts: ts.into(),
        thread_ts: Some(thread_ts.into()),
    }
}

/// A thread rooted at `root_ts`; the n-th message gets ts `root_ts` + n.
pub fn thread(root_ts: &str, messages: &[(&str, &str)]) -> Vec<RawMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(i, (user, text))| {
            let ts = if i == 0 {
                root_ts.to_string()
            } else {
                format!("{root_ts}{i}")
            };
            reply(user, text, &ts, root_ts)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub channel: String,
    pub ts: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub channel: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

/// In-memory chat platform over a flat list of messages.
///
/// A limited fetch returns the message whose `ts` matches; an unlimited
/// fetch returns the whole thread rooted at `ts`.
pub struct ScriptedPlatform {
    messages: Vec<RawMessage>,
    fetch_error: Option<ChannelError>,
    post_error: Option<ChannelError>,
    fetches: Mutex<Vec<FetchCall>>,
    posts: Mutex<Vec<Post>>,
}

impl ScriptedPlatform {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            fetch_error: None,
            post_error: None,
            fetches: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_fetch(mut self, error: ChannelError) -> Self {
        self.fetch_error = Some(error);
        self
    }

    pub fn failing_post(mut self, error: ChannelError) -> Self {
        self.post_error = Some(error);
        self
    }

    pub fn fetches(&self) -> Vec<FetchCall> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for ScriptedPlatform {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RawMessage>, ChannelError> {
        self.fetches.lock().unwrap().push(FetchCall {
            channel: channel.into(),
            ts: ts.into(),
            limit,
        });
        if let Some(error) = &self.fetch_error {
            return Err(error.clone());
        }

        let found = match limit {
            Some(limit) => self
                .messages
                .iter()
                .filter(|m| m.ts == ts)
                .take(limit)
                .cloned()
                .collect(),
            None => self
                .messages
                .iter()
                .filter(|m| m.thread_root() == ts)
                .cloned()
                .collect(),
        };
        Ok(found)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChannelError> {
        if let Some(error) = &self.post_error {
            return Err(error.clone());
        }
        self.posts.lock().unwrap().push(Post {
            channel: channel.into(),
            text: text.into(),
            thread_ts: thread_ts.map(Into::into),
        });
        Ok(())
    }

    async fn identity(&self) -> Result<BotIdentity, ChannelError> {
        Ok(bot_identity())
    }
}

/// A provider that always answers the same way and records every request.
pub struct ScriptedProvider {
    result: Result<Completion, ProviderError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    fn with_result(result: Result<Completion, ProviderError>) -> Self {
        Self {
            result,
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn text(content: &str) -> Self {
        Self::with_result(Ok(Completion {
            content: content.into(),
            model: "gpt-4".into(),
            usage: None,
        }))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::with_result(Err(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.result.clone()
    }
}
