//! Thread context assembly.
//!
//! Fetches a thread's replies, maps them to role-tagged messages, and trims
//! the oldest entries until the history fits the token budget.

pub mod assembler;
pub mod token;

pub use assembler::{ConversationAssembler, convert, truncate};
pub use token::{CharLength, SizeMetric, TokenCounter};
