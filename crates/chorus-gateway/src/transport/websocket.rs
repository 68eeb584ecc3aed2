//! WebSocket transport
//!
//! Splits the socket into a reader task and a writer task, each bridged to
//! the connection by a channel.

use super::{Outbound, Transport, TransportChannels, TransportError, TransportEvent};
use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

/// Channel buffer size in both directions
const CHANNEL_BUFFER_SIZE: usize = 100;

/// tokio-tungstenite backed [`Transport`]
#[derive(Debug, Clone)]
pub struct WsTransport {
    buffer: usize,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            buffer: CHANNEL_BUFFER_SIZE,
        }
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<TransportChannels, TransportError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::info!(url = %url, "WebSocket connected");

        let buffer = self.buffer;
        let (events_tx, inbound) = mpsc::channel(buffer);
        let (outbound, mut outbound_rx) = mpsc::channel::<Outbound>(buffer);
        let (mut ws_sink, mut ws_stream) = socket.split();

        // Reader: wire -> connection
        tokio::spawn(async move {
            let closed = loop {
                let Some(msg) = ws_stream.next().await else {
                    break TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    };
                };

                let parsed = match msg {
                    Ok(Message::Text(text)) => GatewayMessage::from_json(&text),
                    Ok(Message::Binary(bytes)) => GatewayMessage::from_slice(&bytes),
                    Ok(Message::Close(frame)) => {
                        break match frame {
                            Some(frame) => TransportEvent::Closed {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.to_string(),
                            },
                            None => TransportEvent::Closed {
                                code: None,
                                reason: "closed without frame".to_string(),
                            },
                        };
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        break TransportEvent::Closed {
                            code: None,
                            reason: e.to_string(),
                        };
                    }
                };

                match parsed {
                    Ok(frame) => {
                        if events_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping undecodable frame"),
                }
            };

            let _ = events_tx.send(closed).await;
        });

        // Writer: connection -> wire
        tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                let message = match outbound {
                    Outbound::Frame(frame) => match frame.to_json() {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            tracing::warn!(error = %e, op = %frame.op, "Failed to encode frame");
                            continue;
                        }
                    },
                    Outbound::Close { code, reason } => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = ws_sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                };

                if ws_sink.send(message).await.is_err() {
                    tracing::warn!("Failed to send message to WebSocket");
                    break;
                }
            }

            let _ = ws_sink.close().await;
        });

        Ok(TransportChannels { inbound, outbound })
    }
}
