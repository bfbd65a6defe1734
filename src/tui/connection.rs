//! WebSocket connection management for TUI
//!
//! Handles connection state tracking and automatic reconnection with exponential backoff.
//! The socket lives in a background task; the app talks to it through
//! channels and sees only [`ConnectionEvent`]s.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::store::{ClientMessage, PushMessage};

/// Maximum reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Maximum backoff duration in seconds
pub const MAX_BACKOFF_SECS: u64 = 8;

/// Keepalive interval while connected
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Connection state enum
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Connected to the server
    Connected,
    /// Attempting to reconnect
    Reconnecting {
        attempt: u32,
        next_retry: Option<Instant>,
    },
    /// Connection failed, needs manual intervention (max retries exceeded)
    Disconnected,
}

impl ConnectionState {
    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Check if in reconnecting state
    pub fn is_reconnecting(&self) -> bool {
        matches!(self, ConnectionState::Reconnecting { .. })
    }

    /// Get current reconnect attempt number (0 if not reconnecting)
    pub fn reconnect_attempt(&self) -> u32 {
        match self {
            ConnectionState::Reconnecting { attempt, .. } => *attempt,
            _ => 0,
        }
    }
}

/// Calculate exponential backoff duration for a given attempt number
///
/// Attempt 1: 0 seconds (immediate)
/// Attempt 2: 1 second
/// Attempt 3: 2 seconds
/// Attempt 4: 4 seconds
/// Attempt 5+: 8 seconds (max)
pub fn calculate_backoff(attempt: u32) -> Duration {
    if attempt <= 1 {
        Duration::from_secs(0)
    } else {
        let exponent = attempt.saturating_sub(2);
        let secs = if exponent >= 63 {
            MAX_BACKOFF_SECS
        } else {
            2u64.pow(exponent).min(MAX_BACKOFF_SECS)
        };
        Duration::from_secs(secs)
    }
}

/// Delay before reconnect attempt `attempt`, or `None` once the attempts
/// are used up.
pub fn reconnect_delay(attempt: u32) -> Option<Duration> {
    (attempt <= MAX_RECONNECT_ATTEMPTS).then(|| calculate_backoff(attempt))
}

/// What the connection task reports to the app.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    Message(PushMessage),
    /// The socket closed or could not be opened
    Disconnected { reason: String },
    /// Next attempt is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// All attempts failed; waiting for [`PushConnection::reconnect`]
    GaveUp,
}

enum Command {
    Send(ClientMessage),
    Reconnect,
}

/// Handle to the background push connection.
///
/// Dropping the handle stops the task and closes the socket.
pub struct PushConnection {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PushConnection {
    /// Start connecting to `url` in the background. Events arrive on the
    /// returned receiver until the handle is dropped.
    pub fn spawn(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(url.into(), command_rx, event_tx));
        (Self { commands, task }, events)
    }

    /// Queue a message for the server. Subscriptions are replayed after
    /// every reconnect.
    pub fn send(&self, message: ClientMessage) {
        let _ = self.commands.send(Command::Send(message));
    }

    /// Start over after [`ConnectionEvent::GaveUp`].
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }
}

impl Drop for PushConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_connection(
    url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let mut subscription: Option<ClientMessage> = None;
    let mut failures: u32 = 0;
    let mut reported_down = false;

    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                failures = 0;
                reported_down = false;
                info!(%url, "push connection established");
                if events.send(ConnectionEvent::Connected).is_err() {
                    return;
                }

                let (mut write, mut read) = stream.split();
                if let Some(message) = &subscription {
                    if let Err(e) = send_json(&mut write, message).await {
                        warn!(error = %e, "failed to replay subscription");
                    }
                }

                let mut ping =
                    tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
                let reason = loop {
                    tokio::select! {
                        frame = read.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => match PushMessage::parse(&text) {
                                Ok(message) => {
                                    if events.send(ConnectionEvent::Message(message)).is_err() {
                                        return;
                                    }
                                }
                                Err(e) => warn!(error = %e, "dropping undecodable push frame"),
                            },
                            Some(Ok(WsMessage::Close(_))) => break "closed by server".to_string(),
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break e.to_string(),
                            None => break "stream ended".to_string(),
                        },
                        command = commands.recv() => match command {
                            Some(Command::Send(message)) => {
                                if matches!(message, ClientMessage::Subscribe { .. }) {
                                    subscription = Some(message.clone());
                                }
                                if let Err(e) = send_json(&mut write, &message).await {
                                    break e;
                                }
                            }
                            Some(Command::Reconnect) => {}
                            None => return,
                        },
                        _ = ping.tick() => {
                            if let Err(e) = send_json(&mut write, &ClientMessage::Ping).await {
                                break e;
                            }
                        }
                    }
                };

                info!(%reason, "push connection lost");
                reported_down = true;
                if events.send(ConnectionEvent::Disconnected { reason }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(%url, error = %e, "push connect failed");
                if !reported_down {
                    reported_down = true;
                    let reason = e.to_string();
                    if events.send(ConnectionEvent::Disconnected { reason }).is_err() {
                        return;
                    }
                }
            }
        }

        failures += 1;
        match reconnect_delay(failures) {
            Some(delay) => {
                let event = ConnectionEvent::Reconnecting {
                    attempt: failures,
                    delay,
                };
                if events.send(event).is_err() {
                    return;
                }
                let wake = tokio::time::sleep(delay);
                tokio::pin!(wake);
                loop {
                    tokio::select! {
                        _ = &mut wake => break,
                        command = commands.recv() => match command {
                            Some(Command::Send(message)) => remember(&mut subscription, message),
                            Some(Command::Reconnect) => break,
                            None => return,
                        },
                    }
                }
            }
            None => {
                warn!(%url, attempts = MAX_RECONNECT_ATTEMPTS, "giving up on push connection");
                if events.send(ConnectionEvent::GaveUp).is_err() {
                    return;
                }
                loop {
                    match commands.recv().await {
                        Some(Command::Send(message)) => remember(&mut subscription, message),
                        Some(Command::Reconnect) => break,
                        None => return,
                    }
                }
                failures = 0;
            }
        }
    }
}

/// Keep the latest subscription while offline; other messages are dropped.
fn remember(subscription: &mut Option<ClientMessage>, message: ClientMessage) {
    if matches!(message, ClientMessage::Subscribe { .. }) {
        *subscription = Some(message);
    }
}

async fn send_json<S>(write: &mut S, message: &ClientMessage) -> Result<(), String>
where
    S: futures::Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
    write
        .send(WsMessage::Text(text))
        .await
        .map_err(|e| e.to_string())
}
