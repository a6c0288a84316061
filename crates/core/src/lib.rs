//! # Threadwise Core
//!
//! Domain types, traits, and error definitions for the Threadwise chat bridge.
//! This crate has **no transport dependencies**: it defines the domain model
//! that the Slack adapter, the completion provider, and the dispatcher all
//! implement against.
//!
//! Every external collaborator is a trait here; implementations live in
//! their respective crates, and tests substitute scripted ones.

pub mod channel;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod provider;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use channel::{ChatPlatform, EventSource, RawMessage};
pub use error::{ChannelError, Error, ProviderError, Result};
pub use event::{BotEvent, MemberJoinedEvent, MentionEvent, ReactionEvent};
pub use identity::BotIdentity;
pub use message::{ChatMessage, Role, ThreadContext};
pub use provider::{Completion, CompletionRequest, Provider, Usage};
pub use trace::TraceId;
