//! Conversation assembly and event handling for Threadwise.
//!
//! Per inbound event the bot runs one fixed pipeline:
//!
//! 1. **Receive** a mention or reaction from the event stream
//! 2. **Assemble** the thread history, bounded by the token budget
//! 3. **Prepend** the system preamble (and the reacted-to message if needed)
//! 4. **Complete** via the configured provider
//! 5. **Post** the reply into the thread, or an error notice with a trace ID
//!
//! There is no loop and no retry: each event is handled once.

pub mod context;
pub mod dispatcher;

pub use context::{CharLength, ConversationAssembler, SizeMetric, TokenCounter};
pub use dispatcher::{DispatchSettings, EventDispatcher, HandleOutcome};

#[cfg(test)]
pub(crate) mod test_helpers;
