//! Key block subscription over the middleware WebSocket.
//!
//! # State machine
//! ```text
//! Disconnected → Connecting → Subscribed ──(error/close)──▶ Disconnected
//!                    │
//!                    └──(connect failure)──▶ Failed ──▶ Disconnected
//! ```
//! From `Disconnected` the listener either reconnects after a backoff delay
//! or returns, depending on the reconnect settings.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{ListenerConfig, ReconnectConfig};
use crate::listener::events::{parse_frame, subscribe_frame, BlockEvent, InboundFrame};
use crate::observability::metrics;
use crate::resilience::{with_deadline, Backoff, DeadlineExceeded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Failed,
}

/// Why a connection ended.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("no frame received for {0} seconds")]
    Idle(u64),
}

/// Why [`BlockListener::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Shutdown,
    /// The connection dropped and reconnecting is turned off.
    ReconnectDisabled,
    /// `attempts` consecutive reconnects failed.
    ReconnectExhausted { attempts: u32 },
}

enum SessionEnd {
    Shutdown,
    Dropped(ListenerError),
}

/// Connection settings for [`BlockListener`].
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub ws_url: String,
    pub connect_timeout: Duration,
    pub subscribe_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub reconnect: ReconnectConfig,
}

impl ListenerSettings {
    pub fn from_config(ws_url: String, config: &ListenerConfig) -> Self {
        Self {
            ws_url,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            subscribe_timeout: Duration::from_secs(config.subscribe_timeout_secs),
            idle_timeout: (config.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(config.idle_timeout_secs)),
            reconnect: config.reconnect.clone(),
        }
    }
}

/// Streams key block notifications into a callback, one at a time.
pub struct BlockListener {
    settings: ListenerSettings,
    shutdown: broadcast::Receiver<()>,
    state: watch::Sender<ConnectionState>,
}

impl BlockListener {
    pub fn new(settings: ListenerSettings, shutdown: broadcast::Receiver<()>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            settings,
            shutdown,
            state,
        }
    }

    #[cfg(test)]
    fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Listener state changed");
        }
    }

    /// Runs until shutdown or until reconnecting gives up.
    ///
    /// `on_block` is awaited before the next frame is read, so events are
    /// handled strictly in arrival order.
    pub async fn run<F, Fut>(mut self, mut on_block: F) -> ListenerExit
    where
        F: FnMut(BlockEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let reconnect = self.settings.reconnect.clone();
        let mut backoff = Backoff::new(
            reconnect.base_delay_ms,
            reconnect.max_delay_ms,
            reconnect.max_attempts,
        );

        tracing::info!(ws_url = %self.settings.ws_url, "Starting key block listener");

        loop {
            match self.session(&mut on_block, &mut backoff).await {
                SessionEnd::Shutdown => {
                    self.set_state(ConnectionState::Disconnected);
                    tracing::info!("Key block listener stopped");
                    return ListenerExit::Shutdown;
                }
                SessionEnd::Dropped(error) => {
                    tracing::warn!(error = %error, "Event stream disconnected");
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            if !reconnect.enabled {
                tracing::warn!("Reconnect disabled; no longer listening for key blocks");
                return ListenerExit::ReconnectDisabled;
            }
            let Some(delay) = backoff.next_delay() else {
                tracing::error!(
                    attempts = backoff.attempts(),
                    "Giving up on event stream after repeated failures"
                );
                return ListenerExit::ReconnectExhausted {
                    attempts: backoff.attempts(),
                };
            };

            metrics::record_reconnect();
            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to event stream"
            );
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Key block listener stopped");
                    return ListenerExit::Shutdown;
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// One connection from handshake to disconnect.
    async fn session<F, Fut>(&mut self, on_block: &mut F, backoff: &mut Backoff) -> SessionEnd
    where
        F: FnMut(BlockEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.set_state(ConnectionState::Connecting);
        let connect = with_deadline(
            "websocket connect",
            self.settings.connect_timeout,
            connect_async(self.settings.ws_url.as_str()),
        );
        let connected = tokio::select! {
            _ = self.shutdown.recv() => return SessionEnd::Shutdown,
            result = connect => result,
        };
        let stream = match connected {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                self.set_state(ConnectionState::Failed);
                return SessionEnd::Dropped(ListenerError::Connection(e.to_string()));
            }
            Err(deadline) => {
                self.set_state(ConnectionState::Failed);
                return SessionEnd::Dropped(deadline.into());
            }
        };
        tracing::info!(ws_url = %self.settings.ws_url, "WebSocket client connected");

        let (mut write, mut read) = stream.split();
        let subscribe = with_deadline(
            "subscribe",
            self.settings.subscribe_timeout,
            write.send(Message::text(subscribe_frame())),
        );
        match subscribe.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return SessionEnd::Dropped(ListenerError::Connection(e.to_string())),
            Err(deadline) => return SessionEnd::Dropped(deadline.into()),
        }
        self.set_state(ConnectionState::Subscribed);
        backoff.reset();
        tracing::info!("Subscribed to key blocks");

        let idle_timeout = self.settings.idle_timeout;
        loop {
            let next_frame = async {
                match idle_timeout {
                    Some(limit) => timeout(limit, read.next()).await.map_err(|_| limit),
                    None => Ok(read.next().await),
                }
            };

            let frame = tokio::select! {
                _ = self.shutdown.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                frame = next_frame => frame,
            };

            let message = match frame {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    return SessionEnd::Dropped(ListenerError::Connection(e.to_string()))
                }
                Ok(None) => {
                    return SessionEnd::Dropped(ListenerError::Closed("stream ended".to_string()))
                }
                Err(limit) => return SessionEnd::Dropped(ListenerError::Idle(limit.as_secs())),
            };

            match message {
                Message::Text(text) => match parse_frame(text.as_str()) {
                    Ok(InboundFrame::Block(event)) => {
                        metrics::record_block_event();
                        tracing::info!(height = event.height, hash = %event.hash, "New key block");
                        on_block(event).await;
                    }
                    Ok(InboundFrame::SubscriptionAck(channels)) => {
                        tracing::info!(channels = ?channels, "Subscription confirmed");
                    }
                    Ok(InboundFrame::Other) => tracing::debug!("Ignoring non key block frame"),
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed frame"),
                },
                // tungstenite queues the pong itself
                Message::Ping(_) => tracing::trace!("Ping received"),
                Message::Close(frame) => {
                    let reason = frame.map_or_else(|| "no reason".to_string(), |f| format!("{:?}", f));
                    return SessionEnd::Dropped(ListenerError::Closed(reason));
                }
                _ => tracing::debug!("Ignoring non-text frame"),
            }
        }
    }
}
