//! Chat platform adapters for Threadwise.
//!
//! - **Slack Web API**: history lookups, replies, identity ([`SlackClient`])
//! - **Slack Socket Mode**: the inbound event stream ([`SocketModeListener`])

pub mod slack;
pub mod socket_mode;

pub use slack::SlackClient;
pub use socket_mode::SocketModeListener;
