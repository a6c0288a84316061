//! Trace IDs for correlating user-visible failures with log entries.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Number of characters in a generated trace ID.
pub const TRACE_ID_LEN: usize = 6;

/// A short random `[a-zA-Z0-9]` token shown to users when a completion
/// fails, and logged alongside the underlying error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh trace ID.
    pub fn generate() -> Self {
        let id = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TRACE_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
