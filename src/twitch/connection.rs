use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{BotSettings, Credentials};

use super::error::{BotError, Result};
use super::eventsub::SubscriptionRegistrar;
use super::messages::{
    BotEvent, ChatMessageEvent, EventSubMessage, NotificationPayload, RedemptionEvent,
    WelcomePayload, MSG_KEEPALIVE, MSG_NOTIFICATION, MSG_RECONNECT, MSG_REVOCATION, MSG_WELCOME,
    SUB_CHAT_MESSAGE, SUB_REDEMPTION,
};

const EVENTSUB_WS_URL: &str = "wss://eventsub.wss.twitch.tv/ws";
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Connection lifecycle. One live session per live connection; a new session
/// always re-registers its subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Handshaking,
    Subscribing,
    Listening,
    Closed,
    Failed,
}

/// Exponential retry delay with a fixed ceiling. The attempt counter resets
/// only after a fully registered connection reaches `Listening`, so a brief
/// survival still counts as progress.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: u32,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: u32, max_attempts: u32) -> Self {
        Self {
            base,
            cap: BACKOFF_CAP,
            max_attempts,
            attempt: 0,
        }
    }

    /// min(cap, base^attempt) seconds
    pub fn delay(&self) -> Duration {
        let secs = u64::from(self.base)
            .saturating_pow(self.attempt)
            .min(self.cap.as_secs());
        Duration::from_secs(secs)
    }

    /// Record a failed attempt. Returns the delay before the next attempt,
    /// or `None` once the attempt ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.delay();
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Owns the EventSub socket: handshake, subscription registration, receive
/// loop, and the reconnect policy around all three.
pub struct EventSubConnection {
    url: String,
    registrar: SubscriptionRegistrar,
    backoff: Backoff,
    phase: Phase,
}

impl EventSubConnection {
    pub fn new(credentials: Credentials, settings: &BotSettings) -> Result<Self> {
        Ok(Self {
            url: EVENTSUB_WS_URL.to_string(),
            registrar: SubscriptionRegistrar::new(credentials)?,
            backoff: Backoff::new(
                settings.reconnect_delay_base,
                settings.max_reconnect_attempts,
            ),
            phase: Phase::Disconnected,
        })
    }

    #[allow(dead_code)] // Observability hook for connection state
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Run until shutdown (the event receiver is dropped) or until the
    /// reconnect ceiling is reached. A terminal failure kills the redemption
    /// feed, not the process.
    pub async fn run(&mut self, events_tx: mpsc::Sender<BotEvent>) -> Result<()> {
        loop {
            self.phase = Phase::Disconnected;
            match self.run_session(&events_tx).await {
                Ok(()) => {
                    self.phase = Phase::Closed;
                    return Ok(());
                }
                Err(e) => {
                    self.phase = Phase::Failed;
                    match self.backoff.next_delay() {
                        Some(delay) => {
                            log::warn!(
                                "Connection lost: {}. Reconnecting in {}s (attempt {}/{})",
                                e,
                                delay.as_secs(),
                                self.backoff.attempt(),
                                self.backoff.max_attempts()
                            );
                            sleep(delay).await;
                        }
                        None => {
                            log::error!(
                                "Giving up after {} failed connection attempts: {}",
                                self.backoff.max_attempts(),
                                e
                            );
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// One connection attempt: socket open, session welcome, subscription
    /// registration, then the receive loop. Returns `Ok(())` only on local
    /// shutdown; every other exit is an error the retry policy handles.
    async fn run_session(&mut self, events_tx: &mpsc::Sender<BotEvent>) -> Result<()> {
        self.phase = Phase::Handshaking;
        let (mut ws, _) = connect_async(&self.url).await?;

        // The first text frame must be the welcome carrying the session
        // identifier; any other message type is a failed handshake.
        let session_id = loop {
            let frame = match ws.next().await {
                Some(frame) => frame?,
                None => {
                    return Err(BotError::Protocol(
                        "socket ended before session welcome".to_string(),
                    ))
                }
            };
            match frame {
                Message::Text(text) => break parse_welcome(&text)?,
                Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
                Message::Close(_) => {
                    return Err(BotError::Protocol(
                        "socket closed before session welcome".to_string(),
                    ))
                }
                _ => {}
            }
        };
        log::info!("Session established: {}", session_id);

        self.phase = Phase::Subscribing;
        self.registrar.register_session(&session_id).await?;

        self.phase = Phase::Listening;
        self.backoff.reset();

        while let Some(frame) = ws.next().await {
            match frame? {
                Message::Text(text) => {
                    if !self.handle_frame(&text, events_tx).await? {
                        return Ok(());
                    }
                }
                Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
                Message::Close(frame) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code)).unwrap_or(1000);
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "no reason".to_string());
                    return Err(BotError::Transport(format!(
                        "socket closed by server: code={}, reason={}",
                        code, reason
                    )));
                }
                _ => {}
            }
        }

        Err(BotError::Transport("socket stream ended".to_string()))
    }

    /// Decode one inbound frame. Keepalives are consumed silently; event
    /// notifications are forwarded exactly once, in arrival order. Returns
    /// `false` when the receiving side is gone (shutdown).
    async fn handle_frame(&self, text: &str, events_tx: &mpsc::Sender<BotEvent>) -> Result<bool> {
        let envelope: EventSubMessage = serde_json::from_str(text)
            .map_err(|e| BotError::Protocol(format!("undecodable frame: {}", e)))?;

        match envelope.metadata.message_type.as_str() {
            MSG_KEEPALIVE => {}
            MSG_NOTIFICATION => {
                let notification: NotificationPayload = serde_json::from_value(envelope.payload)
                    .map_err(|e| {
                        BotError::Protocol(format!("malformed notification payload: {}", e))
                    })?;

                let event = match notification.subscription.subscription_type.as_str() {
                    SUB_REDEMPTION => {
                        let event: RedemptionEvent = serde_json::from_value(notification.event)
                            .map_err(|e| {
                                BotError::Protocol(format!("malformed redemption event: {}", e))
                            })?;
                        BotEvent::RewardRedeemed(event)
                    }
                    SUB_CHAT_MESSAGE => {
                        let event: ChatMessageEvent = serde_json::from_value(notification.event)
                            .map_err(|e| {
                                BotError::Protocol(format!("malformed chat event: {}", e))
                            })?;
                        BotEvent::ChatMessage(event)
                    }
                    other => {
                        log::debug!("Ignoring notification of type {}", other);
                        return Ok(true);
                    }
                };

                if events_tx.send(event).await.is_err() {
                    return Ok(false);
                }
            }
            MSG_RECONNECT => {
                // The server closes this socket shortly after; the normal
                // retry path re-handshakes against the standard endpoint.
                log::warn!("Server requested session reconnect");
            }
            MSG_REVOCATION => log::warn!("A subscription was revoked by the server"),
            MSG_WELCOME => {}
            other => log::debug!("Unhandled message type: {}", other),
        }

        Ok(true)
    }
}

/// Extract the session identifier from the handshake's first text frame.
/// Anything other than a `session_welcome` aborts the attempt.
fn parse_welcome(text: &str) -> Result<String> {
    let envelope: EventSubMessage = serde_json::from_str(text)
        .map_err(|e| BotError::Protocol(format!("undecodable frame: {}", e)))?;
    if envelope.metadata.message_type != MSG_WELCOME {
        return Err(BotError::Protocol(format!(
            "expected session welcome, got {}",
            envelope.metadata.message_type
        )));
    }
    let welcome: WelcomePayload = serde_json::from_value(envelope.payload)
        .map_err(|e| BotError::Protocol(format!("welcome frame without session: {}", e)))?;
    Ok(welcome.session.id)
}
