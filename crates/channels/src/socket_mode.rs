//! Slack Socket Mode listener.
//!
//! Opens a WebSocket URL through `apps.connections.open`, acknowledges each
//! envelope before handing its event on, and reconnects after a fixed delay
//! whenever the socket drops. Connection lifecycle is reported on the same
//! channel as chat events.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use threadwise_core::channel::EventSource;
use threadwise_core::error::ChannelError;
use threadwise_core::event::{BotEvent, MemberJoinedEvent, MentionEvent, ReactionEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::slack::SlackClient;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 256;

/// Listens for Slack events over Socket Mode.
pub struct SocketModeListener {
    client: Arc<SlackClient>,
    reconnect_delay: Duration,
}

impl SocketModeListener {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self {
            client,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Delay between a dropped connection and the next attempt.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

#[async_trait]
impl EventSource for SocketModeListener {
    async fn start(&self) -> Result<mpsc::Receiver<BotEvent>, ChannelError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::clone(&self.client);
        let delay = self.reconnect_delay;

        tokio::spawn(async move {
            listen(client, delay, tx).await;
            debug!("Socket Mode listener stopped");
        });

        Ok(rx)
    }
}

/// Connect, run a session, wait, repeat. Returns once the receiver is gone.
async fn listen(client: Arc<SlackClient>, delay: Duration, tx: mpsc::Sender<BotEvent>) {
    loop {
        if tx.send(BotEvent::Connecting).await.is_err() {
            return;
        }

        let lifecycle = match client.open_socket_url().await {
            Ok(url) => match run_session(&url, &tx).await {
                Ok(SessionEnd::ReceiverClosed) => return,
                Ok(SessionEnd::Disconnected(reason)) => BotEvent::Disconnected { reason },
                Err(e) => BotEvent::ConnectionError {
                    reason: e.to_string(),
                },
            },
            Err(e) => BotEvent::ConnectionError {
                reason: e.to_string(),
            },
        };

        if tx.send(lifecycle).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

enum SessionEnd {
    Disconnected(String),
    ReceiverClosed,
}

async fn run_session(url: &str, tx: &mpsc::Sender<BotEvent>) -> Result<SessionEnd, ChannelError> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| ChannelError::ConnectionLost(format!("WebSocket connect failed: {e}")))?;
    let (mut sink, mut source) = stream.split();

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => return Ok(SessionEnd::Disconnected(e.to_string())),
        };
        if let WsMessage::Close(frame) = &message {
            let reason = frame
                .as_ref()
                .map(|f| f.reason.as_str().to_owned())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "socket closed".into());
            return Ok(SessionEnd::Disconnected(reason));
        }

        let envelope = match parse_socket_envelope(message) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable Socket Mode frame");
                continue;
            }
        };

        if let Some(envelope_id) = envelope.envelope_id.as_deref() {
            let ack = json!({ "envelope_id": envelope_id }).to_string();
            sink.send(WsMessage::Text(ack.into()))
                .await
                .map_err(|e| ChannelError::ConnectionLost(format!("ack failed: {e}")))?;
        }

        let event = match envelope.envelope_type.as_str() {
            "hello" => Some(BotEvent::Connected),
            "disconnect" => {
                let reason = envelope.reason.unwrap_or_else(|| "disconnect requested".into());
                info!(%reason, "Slack requested reconnect");
                return Ok(SessionEnd::Disconnected(reason));
            }
            "events_api" => match event_from_payload(&envelope.payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable Events API payload");
                    None
                }
            },
            other => {
                debug!(envelope_type = other, "Ignoring Socket Mode envelope");
                None
            }
        };

        if let Some(event) = event {
            if !forward(tx, event) {
                return Ok(SessionEnd::ReceiverClosed);
            }
        }
    }

    Ok(SessionEnd::Disconnected("socket closed".into()))
}

/// Hand an event on without blocking the read loop. A full buffer drops the
/// event; returns `false` once the receiver is gone.
fn forward(tx: &mpsc::Sender<BotEvent>, event: BotEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(?event, "Event buffer full, dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// A Socket Mode envelope.
#[derive(Debug, Deserialize)]
pub struct SocketEnvelope {
    #[serde(default)]
    pub envelope_id: Option<String>,

    #[serde(rename = "type")]
    pub envelope_type: String,

    #[serde(default)]
    pub payload: serde_json::Value,

    /// Present on `disconnect` envelopes
    #[serde(default)]
    pub reason: Option<String>,
}

/// Decode a WebSocket frame. Control frames yield `None`.
pub fn parse_socket_envelope(message: WsMessage) -> Result<Option<SocketEnvelope>, ChannelError> {
    let text = match message {
        WsMessage::Text(text) => text.as_str().to_owned(),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|e| ChannelError::InvalidPayload(format!("invalid utf-8 frame: {e}")))?,
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            return Ok(None);
        }
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ChannelError::InvalidPayload(format!("bad envelope: {e}")))
}

/// Translate an `events_api` payload into a [`BotEvent`]. Event types the
/// bot does not handle yield `None`.
pub fn event_from_payload(payload: &serde_json::Value) -> Result<Option<BotEvent>, ChannelError> {
    let Some(inner) = payload.get("event") else {
        return Err(ChannelError::InvalidPayload("payload has no event".into()));
    };
    let inner: SlackInnerEvent = serde_json::from_value(inner.clone())
        .map_err(|e| ChannelError::InvalidPayload(format!("bad event: {e}")))?;

    let event = match inner {
        SlackInnerEvent::AppMention {
            channel,
            user,
            bot_id,
            text,
            ts,
            thread_ts,
        } => Some(BotEvent::Mention(MentionEvent {
            channel,
            user,
            bot_id,
            text,
            ts,
            thread_ts,
        })),
        SlackInnerEvent::ReactionAdded {
            user,
            reaction,
            item,
        } => Some(BotEvent::ReactionAdded(ReactionEvent {
            user,
            reaction,
            item_type: item.item_type,
            item_channel: item.channel,
            item_ts: item.ts,
        })),
        SlackInnerEvent::MemberJoinedChannel { user, channel } => {
            Some(BotEvent::MemberJoined(MemberJoinedEvent { user, channel }))
        }
        SlackInnerEvent::Other => None,
    };
    Ok(event)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackInnerEvent {
    AppMention {
        #[serde(default)]
        channel: String,
        #[serde(default)]
        user: String,
        #[serde(default)]
        bot_id: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        ts: String,
        #[serde(default)]
        thread_ts: Option<String>,
    },
    ReactionAdded {
        #[serde(default)]
        user: String,
        #[serde(default)]
        reaction: String,
        #[serde(default)]
        item: ReactionItem,
    },
    MemberJoinedChannel {
        #[serde(default)]
        user: String,
        #[serde(default)]
        channel: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ReactionItem {
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}
