//! Event dispatch: one mention or reaction in, one threaded reply out.
//!
//! Each qualifying event is handled in its own task:
//! `received → context assembled → completion requested → posted | error reported`.
//! Completion failures are reported in the thread with a trace ID; every
//! other failure is only logged. Nothing is retried.

use crate::context::assembler::ConversationAssembler;
use crate::context::token::SizeMetric;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use threadwise_config::BotConfig;
use threadwise_core::channel::ChatPlatform;
use threadwise_core::error::{Error, Result};
use threadwise_core::event::{BotEvent, MentionEvent, ReactionEvent};
use threadwise_core::identity::BotIdentity;
use threadwise_core::message::{ChatMessage, ThreadContext};
use threadwise_core::provider::{CompletionRequest, Provider};
use threadwise_core::trace::TraceId;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Fixed text posted when the completion call fails. The trace ID follows.
pub const ERROR_NOTICE: &str = "An error occurred. Please try again later.";

/// The user-visible failure notice for `trace_id`.
pub fn error_notice(trace_id: &TraceId) -> String {
    format!("{ERROR_NOTICE} {trace_id}")
}

/// The slice of configuration the dispatcher needs.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_message: String,
    pub reaction_name: String,
    pub context_budget: usize,
    pub max_concurrent_events: Option<usize>,
}

impl DispatchSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            model: config.completion.model.clone(),
            temperature: config.completion.temperature,
            max_tokens: config.completion.max_tokens,
            system_message: config.conversation.system_message.clone(),
            reaction_name: config.conversation.reaction_name.clone(),
            context_budget: config.conversation.context_budget,
            max_concurrent_events: config.dispatch.max_concurrent_events,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

/// How a handled event ended.
#[derive(Debug)]
pub enum HandleOutcome {
    /// Not for us: the bot's own message, or a reaction we don't answer
    Ignored,

    /// The completion was posted to the thread
    Posted,

    /// The completion failed; the notice with `trace_id` was posted
    ErrorReported { trace_id: TraceId, cause: Error },
}

/// Turns mentions and sentinel reactions into threaded completions.
pub struct EventDispatcher {
    platform: Arc<dyn ChatPlatform>,
    provider: Arc<dyn Provider>,
    assembler: ConversationAssembler,
    identity: BotIdentity,
    settings: DispatchSettings,
    limiter: Option<Arc<Semaphore>>,
}

impl EventDispatcher {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        provider: Arc<dyn Provider>,
        metric: Arc<dyn SizeMetric>,
        identity: BotIdentity,
        settings: DispatchSettings,
    ) -> Self {
        let assembler = ConversationAssembler::new(
            Arc::clone(&platform),
            metric,
            identity.clone(),
            settings.context_budget,
        );
        let limiter = settings
            .max_concurrent_events
            .map(|permits| Arc::new(Semaphore::new(permits)));

        Self {
            platform,
            provider,
            assembler,
            identity,
            settings,
            limiter,
        }
    }

    fn preamble(&self) -> ChatMessage {
        ChatMessage::system(self.settings.system_message.as_str())
    }

    fn answers_reaction(&self, event: &ReactionEvent) -> bool {
        event.reaction == self.settings.reaction_name && event.targets_message()
    }

    /// Answer a mention in its thread.
    pub async fn handle_mention(&self, event: &MentionEvent) -> Result<HandleOutcome> {
        if self.identity.is_self(event.bot_id.as_deref(), &event.user) {
            debug!(channel = %event.channel, "Ignoring mention from the bot itself");
            return Ok(HandleOutcome::Ignored);
        }

        let thread_ts = event.thread_root();
        let history = self.assembler.assemble(&event.channel, thread_ts).await?;
        let context = ThreadContext::new(self.preamble(), history);

        self.complete_and_post(&event.channel, thread_ts, context, |reply| reply.to_string())
            .await
    }

    /// Answer the reacted-to message in its thread, addressed to the reactor.
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> Result<HandleOutcome> {
        if !self.answers_reaction(event) {
            debug!(reaction = %event.reaction, item_type = %event.item_type, "Ignoring reaction");
            return Ok(HandleOutcome::Ignored);
        }

        let channel = event.item_channel.as_str();
        let target = self
            .platform
            .fetch_replies(channel, &event.item_ts, Some(1))
            .await
            .map_err(Error::HistoryUnavailable)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyThread {
                channel: channel.into(),
                thread_ts: event.item_ts.clone(),
            })?;

        let thread_ts = target.thread_root();
        let history = self.assembler.assemble(channel, thread_ts).await?;
        let mut context = ThreadContext::new(self.preamble(), history);
        if !context.push_user_unless_last(&target.text) {
            debug!(channel, thread_ts, "Reacted message already ends the context");
        }

        let reactor = event.user.as_str();
        self.complete_and_post(channel, thread_ts, context, |reply| {
            format!("<@{reactor}>\n\n{reply}")
        })
        .await
    }

    async fn complete_and_post<F>(
        &self,
        channel: &str,
        thread_ts: &str,
        context: ThreadContext,
        render: F,
    ) -> Result<HandleOutcome>
    where
        F: FnOnce(&str) -> String,
    {
        debug!("------------ context begin ------------");
        for message in context.messages() {
            debug!(role = %message.role, "{}", message.content);
        }
        debug!("------------ context end ------------");

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: context.into_messages(),
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_tokens),
        };

        let completion = match self.provider.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                let cause = Error::from(e);
                let trace_id = TraceId::generate();
                error!(
                    trace_id = %trace_id,
                    channel,
                    thread_ts,
                    provider = self.provider.name(),
                    error = %cause,
                    "Completion failed"
                );
                self.platform
                    .post_message(channel, &error_notice(&trace_id), Some(thread_ts))
                    .await
                    .map_err(Error::PostFailure)?;
                return Ok(HandleOutcome::ErrorReported { trace_id, cause });
            }
        };

        debug!(model = %completion.model, "Completion: {}", completion.content);

        self.platform
            .post_message(channel, &render(&completion.content), Some(thread_ts))
            .await
            .map_err(Error::PostFailure)?;
        info!(channel, thread_ts, "Posted completion");
        Ok(HandleOutcome::Posted)
    }

    /// The handling task for `event`, or `None` when the event is only
    /// logged.
    fn task_for(self: &Arc<Self>, event: BotEvent) -> Option<BoxFuture<'static, ()>> {
        let this = Arc::clone(self);
        match event {
            BotEvent::Mention(mention) => Some(
                async move {
                    let _permit = this.acquire().await;
                    let result = this.handle_mention(&mention).await;
                    log_outcome("mention", &result);
                }
                .boxed(),
            ),
            BotEvent::ReactionAdded(reaction) if self.answers_reaction(&reaction) => Some(
                async move {
                    let _permit = this.acquire().await;
                    let result = this.handle_reaction(&reaction).await;
                    log_outcome("reaction_added", &result);
                }
                .boxed(),
            ),
            BotEvent::ReactionAdded(reaction) => {
                debug!(reaction = %reaction.reaction, "Ignoring reaction");
                None
            }
            BotEvent::MemberJoined(joined) => {
                info!(user = %joined.user, channel = %joined.channel, "Member joined channel");
                None
            }
            BotEvent::Connecting => {
                info!("Connecting to Slack");
                None
            }
            BotEvent::Connected => {
                info!("Connected to Slack");
                None
            }
            BotEvent::ConnectionError { reason } => {
                warn!(%reason, "Slack connection failed");
                None
            }
            BotEvent::Disconnected { reason } => {
                warn!(%reason, "Disconnected from Slack");
                None
            }
        }
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        }
    }

    /// Handle `event` in a spawned task. Returns the task handle when one
    /// was spawned.
    pub fn dispatch(self: &Arc<Self>, event: BotEvent) -> Option<JoinHandle<()>> {
        self.task_for(event).map(tokio::spawn)
    }

    /// Dispatch events until the stream closes, then wait for in-flight
    /// handlers to finish.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BotEvent>) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    debug!(kind = event.kind(), "Received event");
                    if let Some(task) = self.task_for(event) {
                        tasks.spawn(task);
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event handler panicked");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Event stream closed");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event handler panicked");
            }
        }
    }
}

fn log_outcome(kind: &str, result: &Result<HandleOutcome>) {
    match result {
        Ok(HandleOutcome::Ignored) => debug!(event = kind, "Event ignored"),
        Ok(HandleOutcome::Posted) => debug!(event = kind, "Event handled"),
        Ok(HandleOutcome::ErrorReported { trace_id, .. }) => {
            warn!(event = kind, trace_id = %trace_id, "Event answered with error notice")
        }
        Err(e) => error!(event = kind, error = %e, "Event handling failed"),
    }
}
