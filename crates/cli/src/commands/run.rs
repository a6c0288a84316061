//! `threadwise run`: connect to Slack and answer threads.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use threadwise_agent::{DispatchSettings, EventDispatcher, TokenCounter};
use threadwise_channels::{SlackClient, SocketModeListener};
use threadwise_config::BotConfig;
use threadwise_core::{ChatPlatform, EventSource};
use threadwise_providers::OpenAiCompatProvider;
use tracing::{info, warn};

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = BotConfig::load(config_path).context("Failed to load config")?;
    info!(
        model = %config.completion.model,
        reaction = %config.conversation.reaction_name,
        budget = config.conversation.context_budget,
        "Starting Threadwise"
    );

    let slack = Arc::new(SlackClient::new(&config.slack)?);
    let identity = slack
        .identity()
        .await
        .context("Failed to resolve bot identity")?;
    info!(bot_id = %identity.bot_id, user_id = %identity.user_id, "Resolved bot identity");

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.completion)?);
    let counter = Arc::new(TokenCounter::from_path(
        config.conversation.tokenizer_path.as_deref(),
    ));
    info!(mode = counter.mode(), "Context size metric ready");

    let dispatcher = Arc::new(EventDispatcher::new(
        slack.clone(),
        provider,
        counter,
        identity,
        DispatchSettings::from_config(&config),
    ));

    let events = SocketModeListener::new(slack).start().await?;

    tokio::select! {
        _ = dispatcher.run(events) => warn!("Event stream ended"),
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    Ok(())
}
