//! Error types for the Threadwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! The top-level [`Error`] carries the per-event failure taxonomy; each
//! collaborator boundary has its own error type underneath it.

use thiserror::Error;

/// Failures that can end the handling of a single inbound event.
///
/// None of these terminate the process. Configuration failures are fatal
/// but live in the config crate, since they only occur before any event
/// is received.
#[derive(Debug, Error)]
pub enum Error {
    // --- Context assembly ---
    #[error("Conversation history unavailable: {0}")]
    HistoryUnavailable(#[source] ChannelError),

    #[error("Thread {thread_ts} in channel {channel} has no messages")]
    EmptyThread { channel: String, thread_ts: String },

    #[error("Failed encoding message: {0}")]
    EncodingFailure(String),

    // --- Completion ---
    #[error("Completion unavailable: {0}")]
    CompletionUnavailable(#[source] ProviderError),

    #[error("Completion provider returned no choices")]
    EmptyCompletion,

    // --- Delivery ---
    #[error("Failed posting message: {0}")]
    PostFailure(#[source] ChannelError),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::EmptyCompletion => Self::EmptyCompletion,
            other => Self::CompletionUnavailable(other),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider returned no choices")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    #[error("{method} returned HTTP {status}")]
    Http { method: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}
