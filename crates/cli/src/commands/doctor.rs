//! `threadwise doctor`: Diagnose configuration and connectivity.

use std::path::Path;
use threadwise_agent::TokenCounter;
use threadwise_channels::SlackClient;
use threadwise_config::BotConfig;
use threadwise_core::{ChatPlatform, Provider};
use threadwise_providers::OpenAiCompatProvider;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("🩺 Threadwise Doctor: System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    // Check config
    let config = match BotConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };
    println!("     {:?}", config.slack);
    println!("     {:?}", config.completion);
    println!(
        "     reaction=:{}: budget={} concurrency={}",
        config.conversation.reaction_name,
        config.conversation.context_budget,
        config
            .dispatch
            .max_concurrent_events
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
    );

    // Check tokenizer
    let counter = TokenCounter::from_path(config.conversation.tokenizer_path.as_deref());
    match (&config.conversation.tokenizer_path, counter.mode()) {
        (_, "characters") => {
            println!("  ⚠️  No token encoder available, counting characters");
            issues += 1;
        }
        (None, mode) => println!("  ✅ Counting tokens ({mode})"),
        (Some(path), "bpe") => {
            println!(
                "  ⚠️  Tokenizer at {} not loaded, using built-in BPE",
                path.display()
            );
            issues += 1;
        }
        (Some(_), mode) => println!("  ✅ Tokenizer loaded ({mode})"),
    }

    // Check Slack
    match SlackClient::new(&config.slack) {
        Ok(slack) => match slack.identity().await {
            Ok(identity) => println!(
                "  ✅ Slack auth ok (bot_id={}, user_id={})",
                identity.bot_id, identity.user_id
            ),
            Err(e) => {
                println!("  ❌ Slack auth failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Slack client unavailable: {e}");
            issues += 1;
        }
    }

    // Check completion provider
    match OpenAiCompatProvider::from_config(&config.completion) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Completion endpoint reachable"),
            Ok(false) => {
                println!("  ⚠️  Completion endpoint rejected the credentials");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Completion endpoint unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Completion provider unavailable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
