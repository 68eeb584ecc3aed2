//! # chorus-gateway
//!
//! Client for a real-time event gateway: identifies, keeps the connection
//! alive with heartbeats, routes dispatch events and negotiates voice sessions.

pub mod client;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod rest;
pub mod supervisor;
pub mod transport;
pub mod voice;

pub use client::{GatewayClient, GatewayOptions, GatewayUrl, RunningGateway};
pub use connection::{
    ClientError, CloseReason, ConnectionContext, ConnectionExit, ConnectionState, GatewayHandle,
    SequenceTracker, StateKey, StatePatch, StatusUpdate, VoiceListener,
};
pub use events::GatewayEventType;
pub use handlers::{EventContext, EventHandler, HandlerError, HandlerResult, LoggingEventHandler};
pub use protocol::{GatewayMessage, OpCode};
pub use rest::{HttpRestClient, RestClient, RestError};
pub use supervisor::{Supervisor, SupervisorPolicy};
pub use transport::{
    Outbound, Transport, TransportChannels, TransportError, TransportEvent, TransportPeer,
    WsTransport,
};
pub use voice::{VoiceConnectOptions, VoiceConnector, VoiceError, VoiceSession, VoiceStateOptions};
