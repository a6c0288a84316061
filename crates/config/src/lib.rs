//! Configuration loading, validation, and management for Threadwise.
//!
//! Settings come from built-in defaults, an optional TOML file, and
//! environment variables, in increasing order of priority. The result is
//! validated once at startup and then passed around as an immutable value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the optional config file.
pub const CONFIG_PATH_ENV: &str = "THREADWISE_CONFIG";

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_APP_TOKEN: &str = "SLACK_APP_TOKEN";
pub const ENV_SLACK_API_BASE: &str = "SLACK_API_BASE";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "GPT_MODEL";
pub const ENV_TEMPERATURE: &str = "GPT_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "GPT_MAX_TOKENS";
pub const ENV_SYSTEM_MESSAGE: &str = "SYSTEM_MESSAGE";
pub const ENV_REACTION_NAME: &str = "REACTION_NAME";
pub const ENV_CONTEXT_BUDGET: &str = "CONTEXT_TOKEN_BUDGET";
pub const ENV_TOKENIZER_PATH: &str = "TOKENIZER_PATH";
pub const ENV_MAX_CONCURRENT_EVENTS: &str = "MAX_CONCURRENT_EVENTS";

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chat platform credentials and endpoint
    #[serde(default)]
    pub slack: SlackConfig,

    /// Completion provider settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Context assembly settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Event dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...)
    #[serde(default)]
    pub bot_token: String,

    /// App-level token (xapp-...) for Socket Mode
    #[serde(default)]
    pub app_token: String,

    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            app_token: String::new(),
            api_base: default_slack_api_base(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    700
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Preamble sent as the system message
    #[serde(default = "default_system_message")]
    pub system_message: String,

    /// Reaction name that triggers a reply to the reacted-to message
    #[serde(default = "default_reaction_name")]
    pub reaction_name: String,

    /// Size budget for the thread history
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// HuggingFace `tokenizer.json`; unset = built-in GPT-3 BPE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_system_message() -> String {
    "The assistant's name is Threadwise.".into()
}
fn default_reaction_name() -> String {
    "osiete_ai".into()
}
fn default_context_budget() -> usize {
    3000
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_message: default_system_message(),
            reaction_name: default_reaction_name(),
            context_budget: default_context_budget(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cap on events processed at once. Unset = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_events: Option<usize>,
}

fn redact(s: &str) -> &'static str {
    if s.is_empty() {
        "None"
    } else {
        "[REDACTED]"
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("slack", &self.slack)
            .field("completion", &self.completion)
            .field("conversation", &self.conversation)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("app_token", &redact(&self.app_token))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// The config file is `path` if given, else `$THREADWISE_CONFIG` if set.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load configuration with a custom environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file layer only (no environment, no validation).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Overlay environment variables onto the current values.
    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env(ENV_BOT_TOKEN) {
            self.slack.bot_token = v;
        }
        if let Some(v) = env(ENV_APP_TOKEN) {
            self.slack.app_token = v;
        }
        if let Some(v) = env(ENV_SLACK_API_BASE) {
            self.slack.api_base = v;
        }
        if let Some(v) = env(ENV_API_KEY) {
            self.completion.api_key = v;
        }
        if let Some(v) = env(ENV_API_URL) {
            self.completion.api_url = v;
        }
        if let Some(v) = env(ENV_MODEL) {
            self.completion.model = v;
        }
        if let Some(v) = env(ENV_TEMPERATURE) {
            self.completion.temperature = parse_env(ENV_TEMPERATURE, &v)?;
        }
        if let Some(v) = env(ENV_MAX_TOKENS) {
            self.completion.max_tokens = parse_env(ENV_MAX_TOKENS, &v)?;
        }
        if let Some(v) = env(ENV_SYSTEM_MESSAGE) {
            self.conversation.system_message = v;
        }
        if let Some(v) = env(ENV_REACTION_NAME) {
            self.conversation.reaction_name = v;
        }
        if let Some(v) = env(ENV_CONTEXT_BUDGET) {
            self.conversation.context_budget = parse_env(ENV_CONTEXT_BUDGET, &v)?;
        }
        if let Some(v) = env(ENV_TOKENIZER_PATH).filter(|v| !v.is_empty()) {
            self.conversation.tokenizer_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env(ENV_MAX_CONCURRENT_EVENTS).filter(|v| !v.is_empty()) {
            self.dispatch.max_concurrent_events =
                Some(parse_env(ENV_MAX_CONCURRENT_EVENTS, &v)?);
        }
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (ENV_API_KEY, &self.completion.api_key),
            (ENV_BOT_TOKEN, &self.slack.bot_token),
            (ENV_APP_TOKEN, &self.slack.app_token),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key.into()));
            }
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_TEMPERATURE} must be between 0.0 and 2.0"
            )));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_MAX_TOKENS} must be > 0"
            )));
        }
        if self.conversation.context_budget == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_CONTEXT_BUDGET} must be > 0"
            )));
        }
        if self.conversation.reaction_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_REACTION_NAME} must not be empty"
            )));
        }
        if self.dispatch.max_concurrent_events == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_MAX_CONCURRENT_EVENTS} must be > 0 when set"
            )));
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::ValidationError(format!("{key}={value:?}: {e}")))
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required configuration missing: {0} is not set")]
    Missing(String),

    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
