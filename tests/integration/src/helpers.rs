//! Test helpers for integration tests
//!
//! Provides a scripted REST client, an in-memory transport, a recording
//! event handler and voice connector, and `TestGateway` tying them together.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use chorus_core::User;
use chorus_gateway::{
    EventContext, EventHandler, GatewayClient, GatewayEventType, GatewayHandle,
    GatewayMessage, GatewayOptions, HandlerResult, OpCode, Outbound, RestClient, RestError,
    RunningGateway, StateKey, Transport, TransportChannels, TransportError, TransportPeer,
    VoiceConnector, VoiceError, VoiceSession,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::fixtures::{bot_user, test_options};

/// Upper bound for waiting on a single frame
const RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw gateway URL the mock REST client answers with
pub const MOCK_GATEWAY_URL: &str = "wss://gateway.test/";

// ============================================================================
// REST
// ============================================================================

/// Scripted REST collaborator
pub struct MockRest {
    user: User,
    unauthorized: bool,
    user_calls: AtomicUsize,
    gateway_calls: AtomicUsize,
}

impl MockRest {
    /// Accepts the credential and reports the bot user
    pub fn ok() -> Self {
        Self {
            user: bot_user(),
            unauthorized: false,
            user_calls: AtomicUsize::new(0),
            gateway_calls: AtomicUsize::new(0),
        }
    }

    /// Rejects the credential
    pub fn unauthorized() -> Self {
        Self {
            unauthorized: true,
            ..Self::ok()
        }
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn gateway_calls(&self) -> usize {
        self.gateway_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestClient for MockRest {
    async fn gateway_url(&self) -> Result<String, RestError> {
        self.gateway_calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized {
            return Err(RestError::Unauthorized);
        }
        Ok(MOCK_GATEWAY_URL.to_string())
    }

    async fn current_user(&self) -> Result<User, RestError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized {
            return Err(RestError::Unauthorized);
        }
        Ok(self.user.clone())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport handing the far end of every connection to the test
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<TransportPeer>,
    urls: Mutex<Vec<String>>,
    refuse: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TransportPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            peers,
            urls: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
        });
        (transport, rx)
    }

    /// Transport whose connects always fail
    pub fn refusing() -> Arc<Self> {
        let (transport, _) = Self::new();
        transport.refuse.store(true, Ordering::SeqCst);
        transport
    }

    /// URLs passed to `connect`, in order
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.urls.lock().len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<TransportChannels, TransportError> {
        self.urls.lock().push(url.to_string());
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (channels, peer) = TransportChannels::in_memory(64);
        self.peers.send(peer).map_err(|_| TransportError::Closed)?;
        Ok(channels)
    }
}

// ============================================================================
// Event handler and voice connector
// ============================================================================

/// One handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub name: String,
    pub frame_sequence: Option<u64>,
    pub tracker_sequence: Option<u64>,
}

/// Event handler remembering every event it receives
///
/// Handlers run on their own task, so tests wait for the count they expect.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<RecordedEvent>>,
    notify: Notify,
}

impl RecordingHandler {
    /// Wait until at least `count` events arrived and return all of them
    pub async fn wait_for(&self, count: usize) -> Result<Vec<RecordedEvent>> {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                let notified = self.notify.notified();
                {
                    let events = self.events.lock();
                    if events.len() >= count {
                        return events.clone();
                    }
                }
                notified.await;
            }
        })
        .await
        .map_err(|_| anyhow!("handler did not receive {count} events"))
    }

    /// Normalized names of the first `count` events, waiting for them
    pub async fn names(&self, count: usize) -> Result<Vec<String>> {
        Ok(self
            .wait_for(count)
            .await?
            .into_iter()
            .map(|e| e.name)
            .collect())
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_event(
        &self,
        event: &GatewayEventType,
        frame: &GatewayMessage,
        ctx: &EventContext,
    ) -> HandlerResult<()> {
        self.events.lock().push(RecordedEvent {
            name: event.normalized(),
            frame_sequence: frame.s,
            tracker_sequence: ctx.sequence().get(),
        });
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Voice connector remembering the sessions it was given
#[derive(Debug, Default)]
pub struct RecordingConnector {
    sessions: Mutex<Vec<VoiceSession>>,
    notify: Notify,
}

impl RecordingConnector {
    /// Wait until a session was handed over
    pub async fn next_session(&self) -> Result<VoiceSession> {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                let notified = self.notify.notified();
                if let Some(session) = self.sessions.lock().first().cloned() {
                    return session;
                }
                notified.await;
            }
        })
        .await
        .map_err(|_| anyhow!("no voice session handed to the connector"))
    }
}

#[async_trait]
impl VoiceConnector for RecordingConnector {
    async fn connect(&self, session: VoiceSession) -> Result<(), VoiceError> {
        self.sessions.lock().push(session);
        self.notify.notify_waiters();
        Ok(())
    }
}

// ============================================================================
// Test gateway
// ============================================================================

/// A started connection plus the far end of its transport
pub struct TestGateway {
    pub running: RunningGateway,
    pub peer: TransportPeer,
    pub handler: Arc<RecordingHandler>,
    pub rest: Arc<MockRest>,
    pub transport: Arc<MemoryTransport>,
}

impl TestGateway {
    /// Start with test options and no voice connector
    pub async fn start() -> Result<Self> {
        Self::start_with(test_options(), None).await
    }

    /// Start with custom options
    pub async fn start_with(
        options: GatewayOptions,
        connector: Option<Arc<RecordingConnector>>,
    ) -> Result<Self> {
        let rest = Arc::new(MockRest::ok());
        let (transport, mut peers) = MemoryTransport::new();
        let handler = Arc::new(RecordingHandler::default());

        let mut client = GatewayClient::new(options, rest.clone(), transport.clone())
            .with_handler(handler.clone());
        if let Some(connector) = connector {
            client = client.with_voice_connector(connector);
        }

        let running = client.start().await?;
        let peer = peers
            .recv()
            .await
            .ok_or_else(|| anyhow!("transport was not connected"))?;

        Ok(Self {
            running,
            peer,
            handler,
            rest,
            transport,
        })
    }

    pub fn handle(&self) -> &GatewayHandle {
        self.running.handle()
    }

    /// Deliver a server frame
    pub async fn send(&self, frame: GatewayMessage) -> Result<()> {
        ensure!(self.peer.deliver(frame).await, "connection stopped reading");
        Ok(())
    }

    /// Next message the connection wrote, frames and close requests alike
    pub async fn recv_outbound(&mut self) -> Result<Outbound> {
        tokio::time::timeout(RECV_TIMEOUT, self.peer.sent.recv())
            .await
            .map_err(|_| anyhow!("timed out waiting for outbound message"))?
            .ok_or_else(|| anyhow!("transport closed"))
    }

    /// Next frame the connection wrote
    pub async fn recv(&mut self) -> Result<GatewayMessage> {
        match self.recv_outbound().await? {
            Outbound::Frame(frame) => Ok(frame),
            Outbound::Close { code, reason } => Err(anyhow!("connection closed ({code}): {reason}")),
        }
    }

    /// Next frame with opcode `op`, skipping others
    pub async fn recv_op(&mut self, op: OpCode) -> Result<GatewayMessage> {
        loop {
            let frame = self.recv().await?;
            if frame.op == op {
                return Ok(frame);
            }
        }
    }

    /// Consume identify and deliver READY, without HELLO
    pub async fn ready(&mut self) -> Result<()> {
        let identify = self.recv().await?;
        ensure!(identify.op == OpCode::Identify, "expected identify, got {identify}");
        self.send(crate::fixtures::ready_frame(1)).await
    }

    /// Read a state attribute; doubles as a barrier for earlier frames
    pub async fn state(&self, key: StateKey) -> Result<Value> {
        Ok(self.handle().get_state(key).await?)
    }
}
