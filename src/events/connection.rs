//! Websocket task feeding an [`EventStream`].
//!
//! # Responsibilities
//! - Connect to the node, reconnecting with backoff whenever the socket drops
//! - Replay registrations after every connect
//! - Forward queued register/unregister frames
//! - Parse incoming frames and publish confirmations

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::schema::WebsocketConfig;
use crate::events::stream::{EventStream, OutboundReceiver};
use crate::events::types::ConfirmationEvent;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Why a connected session ended.
enum SessionEnd {
    Dropped,
    Shutdown,
}

/// Owns the socket for one [`EventStream`].
pub struct EventConnection {
    url: String,
    stream: Arc<EventStream>,
    backoff: Backoff,
}

impl EventConnection {
    pub fn new(config: &WebsocketConfig, stream: Arc<EventStream>) -> Self {
        Self {
            url: config.url.clone(),
            stream,
            backoff: Backoff::new(config.reconnect_base_ms, config.reconnect_max_ms),
        }
    }

    /// Run until `shutdown` fires.
    pub async fn run(mut self, mut outbound: OutboundReceiver, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(url = %self.url, "Event stream starting");

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    tracing::info!(url = %self.url, "Event stream connected");
                    self.backoff.reset();
                    match self.session(socket, &mut outbound, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Dropped => tracing::warn!(url = %self.url, "Event stream disconnected"),
                    }
                }
                Err(e) => tracing::warn!(url = %self.url, error = %e, "Event stream connect failed"),
            }

            let delay = self.backoff.next_delay();
            metrics::record_websocket_reconnect();
            tracing::debug!(attempt = self.backoff.attempts(), delay_ms = delay.as_millis() as u64, "Reconnecting event stream");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        self.stream.set_connected(false);
        tracing::info!("Event stream stopped");
    }

    async fn session<S>(
        &self,
        socket: tokio_tungstenite::WebSocketStream<S>,
        outbound: &mut OutboundReceiver,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> SessionEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut source) = socket.split();

        self.stream.set_connected(true);
        // Frames queued before this connect are superseded by the replay.
        while outbound.try_recv().is_ok() {}
        for message in self.stream.replay_messages() {
            if let Err(e) = sink.send(Message::text(message.to_text())).await {
                tracing::warn!(error = %e, "Failed to replay registration");
                self.stream.set_connected(false);
                return SessionEnd::Dropped;
            }
        }

        let end = loop {
            tokio::select! {
                Some(message) = outbound.recv() => {
                    if let Err(e) = sink.send(Message::text(message.to_text())).await {
                        tracing::warn!(error = %e, "Failed to send event stream frame");
                        break SessionEnd::Dropped;
                    }
                }
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Event stream read error");
                        break SessionEnd::Dropped;
                    }
                },
                _ = shutdown.recv() => {
                    let _ = sink.close().await;
                    break SessionEnd::Shutdown;
                }
            }
        };

        self.stream.set_connected(false);
        end
    }

    fn handle_text(&self, text: &str) {
        match ConfirmationEvent::parse(text) {
            Ok(Some(event)) => {
                tracing::debug!(
                    hash = %event.hash,
                    account = %event.account,
                    subtype = event.block.subtype.as_str(),
                    "Confirmation received"
                );
                self.stream.publish(event);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Discarding event stream frame"),
        }
    }
}
