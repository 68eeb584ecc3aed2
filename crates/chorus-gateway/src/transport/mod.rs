//! Transport boundary
//!
//! The connection never touches a socket. It reads [`TransportEvent`]s and
//! writes [`Outbound`] messages over channels; a [`Transport`] implementation
//! bridges those channels to the wire.

mod websocket;

pub use websocket::WsTransport;

use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something that happened on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded gateway frame
    Frame(GatewayMessage),
    /// The remote side closed, or the socket failed
    Closed { code: Option<u16>, reason: String },
}

/// Something the connection wants written
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(GatewayMessage),
    Close { code: u16, reason: String },
}

/// Transport failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport closed")]
    Closed,
}

/// Channel pair handed to a connection
#[derive(Debug)]
pub struct TransportChannels {
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<Outbound>,
}

/// Far end of an in-memory transport
#[derive(Debug)]
pub struct TransportPeer {
    /// Deliver events to the connection
    pub events: mpsc::Sender<TransportEvent>,
    /// Messages the connection wrote
    pub sent: mpsc::Receiver<Outbound>,
}

impl TransportChannels {
    /// Create channels with no socket behind them
    pub fn in_memory(buffer: usize) -> (Self, TransportPeer) {
        let (events, inbound) = mpsc::channel(buffer);
        let (outbound, sent) = mpsc::channel(buffer);
        (
            Self { inbound, outbound },
            TransportPeer { events, sent },
        )
    }
}

impl TransportPeer {
    /// Deliver a frame; false once the connection stopped reading
    pub async fn deliver(&self, frame: GatewayMessage) -> bool {
        self.events.send(TransportEvent::Frame(frame)).await.is_ok()
    }

    /// Next gateway frame written by the connection, skipping close requests
    pub async fn next_frame(&mut self) -> Option<GatewayMessage> {
        while let Some(outbound) = self.sent.recv().await {
            if let Outbound::Frame(frame) = outbound {
                return Some(frame);
            }
        }
        None
    }
}

/// Opens gateway connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportChannels, TransportError>;
}
