//! Connection loop
//!
//! One task per connection. It owns the context, takes transport events,
//! mailbox commands and heartbeat signals one at a time, and ends with a
//! [`CloseReason`] for whoever supervises it.

use super::heartbeat::{HeartbeatMonitor, HeartbeatStale};
use super::{
    Command, ConnectionContext, ConnectionState, GatewayHandle, Session, StateKey, SEND_TIMEOUT,
};
use crate::handlers::{DispatchRouter, EventHandler, InitialVoice};
use crate::protocol::{
    CloseReason, GatewayMessage, IdentifyPayload, OpCode, VoiceStateUpdatePayload,
};
use crate::rest::RestClient;
use crate::transport::{Outbound, TransportChannels, TransportEvent};
use crate::voice::{spawn_negotiation, VoiceConnectOptions, VoiceConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Mailbox capacity
const COMMAND_BUFFER_SIZE: usize = 64;

/// Per-connection settings
#[derive(Debug, Clone)]
pub(crate) struct ConnectionConfig {
    pub large_threshold: u32,
    pub settle_delay: Duration,
    pub voice_timeout: Duration,
    pub initial_voice: Option<VoiceConnectOptions>,
}

/// Collaborators of a connection
#[derive(Default)]
pub(crate) struct Collaborators {
    pub handler: Option<Arc<dyn EventHandler>>,
    pub connector: Option<Arc<dyn VoiceConnector>>,
    pub rest: Option<Arc<dyn RestClient>>,
}

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionExit {
    pub reason: CloseReason,
    /// READY was received at some point
    pub reached_ready: bool,
}

/// A spawned connection
pub(crate) struct SpawnedConnection {
    pub handle: GatewayHandle,
    pub state: watch::Receiver<ConnectionState>,
    pub task: JoinHandle<ConnectionExit>,
}

enum Wake {
    Transport(Option<TransportEvent>),
    Command(Option<Command>),
    Stale,
}

pub(crate) struct Connection {
    ctx: ConnectionContext,
    router: DispatchRouter,
    identify: IdentifyPayload,
    voice_timeout: Duration,
    inbound: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<Outbound>,
    commands: mpsc::Receiver<Command>,
    handle: GatewayHandle,
    heartbeat: Option<HeartbeatMonitor>,
    stale_tx: mpsc::Sender<HeartbeatStale>,
    stale_rx: mpsc::Receiver<HeartbeatStale>,
    rest: Option<Arc<dyn RestClient>>,
    negotiations: u64,
    reached_ready: bool,
}

impl Connection {
    /// Start a connection over already-open transport channels
    pub(crate) fn spawn(
        config: ConnectionConfig,
        session: Session,
        channels: TransportChannels,
        collaborators: Collaborators,
    ) -> SpawnedConnection {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (stale_tx, stale_rx) = mpsc::channel(1);
        let handle = GatewayHandle::new(commands_tx);

        let identify = IdentifyPayload::new(session.token(), config.large_threshold);
        let user_id = session.user_id();
        let ctx = ConnectionContext::new(session, config.initial_voice);
        let state = ctx.subscribe();

        let initial_voice =
            InitialVoice::new(handle.clone(), config.settle_delay, collaborators.connector);
        let router = DispatchRouter::new(collaborators.handler, initial_voice);

        let connection = Self {
            ctx,
            router,
            identify,
            voice_timeout: config.voice_timeout,
            inbound: channels.inbound,
            outbound: channels.outbound,
            commands,
            handle: handle.clone(),
            heartbeat: None,
            stale_tx,
            stale_rx,
            rest: collaborators.rest,
            negotiations: 0,
            reached_ready: false,
        };

        let task = tokio::spawn(
            connection
                .run()
                .instrument(tracing::info_span!("connection", user_id = %user_id)),
        );

        SpawnedConnection {
            handle,
            state,
            task,
        }
    }

    async fn run(mut self) -> ConnectionExit {
        if self.send(GatewayMessage::identify(&self.identify)).await {
            tracing::info!("Identify sent");
        } else {
            tracing::warn!("Failed to send identify");
        }
        self.ctx.set_state(ConnectionState::AwaitingHello);

        let reason = loop {
            // Liveness first, then the wire, then the mailbox
            let wake = tokio::select! {
                biased;

                Some(_) = self.stale_rx.recv() => Wake::Stale,
                event = self.inbound.recv() => Wake::Transport(event),
                command = self.commands.recv() => Wake::Command(command),
            };

            let outcome = match wake {
                Wake::Transport(Some(TransportEvent::Frame(frame))) => self.handle_frame(frame).await,
                Wake::Transport(Some(TransportEvent::Closed { code, reason })) => {
                    Some(CloseReason::Remote { code, reason })
                }
                Wake::Transport(None) => Some(CloseReason::Remote {
                    code: None,
                    reason: "transport dropped".to_string(),
                }),
                Wake::Command(Some(command)) => self.handle_command(command).await,
                Wake::Command(None) => Some(CloseReason::Shutdown),
                Wake::Stale => Some(CloseReason::HeartbeatStale),
            };

            if let Some(reason) = outcome {
                break reason;
            }
        };

        self.close(&reason).await;
        self.teardown();

        ConnectionExit {
            reason,
            reached_ready: self.reached_ready,
        }
    }

    async fn handle_frame(&mut self, frame: GatewayMessage) -> Option<CloseReason> {
        if let Err(e) = frame.validate() {
            tracing::warn!(op = %frame.op, error = %e, "Dropping invalid frame");
            return None;
        }

        // Recorded before routing so handlers never see an older value
        if let Some(sequence) = frame.s {
            self.ctx.sequence().set(sequence);
        }
        tracing::trace!(op = %frame.op, sequence = ?frame.s, "Frame received");

        match frame.op {
            OpCode::Hello => self.on_hello(&frame),
            OpCode::HeartbeatAck => {
                if let Some(heartbeat) = &self.heartbeat {
                    heartbeat.ack();
                }
            }
            OpCode::Heartbeat => match &self.heartbeat {
                Some(heartbeat) => heartbeat.beat_now(),
                None => {
                    let last = self.ctx.sequence().get();
                    self.send(GatewayMessage::heartbeat(last)).await;
                }
            },
            OpCode::Dispatch => {
                self.router.route(&mut self.ctx, &frame);
                self.reached_ready |= self.ctx.state() == ConnectionState::SteadyState;
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                return Some(CloseReason::Reconnect);
            }
            OpCode::InvalidSession => {
                tracing::info!(resumable = ?frame.d, "Session invalidated");
                return Some(CloseReason::InvalidSession);
            }
            op => tracing::warn!(op = %op, "Unexpected opcode from server"),
        }

        None
    }

    fn on_hello(&mut self, frame: &GatewayMessage) {
        let Some(hello) = frame.as_hello() else {
            tracing::warn!("Malformed hello payload");
            return;
        };

        tracing::info!(interval_ms = hello.heartbeat_interval, "Hello received");

        self.heartbeat = Some(HeartbeatMonitor::spawn(
            Duration::from_millis(hello.heartbeat_interval),
            self.ctx.sequence().clone(),
            self.outbound.clone(),
            self.stale_tx.clone(),
        ));

        if self.ctx.state() == ConnectionState::AwaitingHello {
            self.ctx.set_state(ConnectionState::Identified);
        }
    }

    async fn handle_command(&mut self, command: Command) -> Option<CloseReason> {
        match command {
            Command::GetState { key, reply } => {
                let _ = reply.send(self.ctx.get(key));
            }
            Command::UpdateState(patch) => self.ctx.apply(patch),
            Command::ClearState(keys) => self.ctx.clear(&keys),
            Command::StartVoiceConnection(options) => {
                tracing::info!(
                    guild_id = %options.guild_id,
                    channel_id = %options.channel_id,
                    "Requesting voice connection"
                );
                let payload = VoiceStateUpdatePayload {
                    guild_id: options.guild_id,
                    channel_id: Some(options.channel_id),
                    self_mute: options.self_mute,
                    self_deaf: options.self_deaf,
                };
                self.send(GatewayMessage::voice_state_update(&payload)).await;
            }
            Command::StartVoiceListener { reply } => {
                self.negotiations += 1;
                let negotiation = spawn_negotiation(
                    self.negotiations,
                    self.voice_timeout,
                    self.handle.commands(),
                    reply,
                );
                if let Some(previous) = self.ctx.voice.replace(negotiation) {
                    tracing::debug!(negotiation = previous.id(), "Replacing voice negotiation");
                }
            }
            Command::VoiceStateUpdate {
                user_id,
                payload,
                ack,
            } => {
                tracing::debug!(
                    guild_id = %payload.guild_id,
                    channel_id = ?payload.channel_id,
                    user_id = %user_id,
                    "Sending voice state update"
                );
                self.send(GatewayMessage::voice_state_update(&payload)).await;
                let _ = ack.send(());
            }
            Command::StatusUpdate(status) => {
                self.send(GatewayMessage::status_update(&status.into_payload()))
                    .await;
            }
            Command::RequestGuildMembers(payload) => {
                self.send(GatewayMessage::request_guild_members(&payload))
                    .await;
            }
            Command::VoiceNegotiationFinished { id } => {
                if self.ctx.voice.as_ref().is_some_and(|v| v.id() == id) {
                    self.ctx.voice = None;
                }
            }
            Command::Shutdown => return Some(CloseReason::Shutdown),
        }

        None
    }

    /// Hand a frame to the transport; false if it is gone or stuck
    async fn send(&self, frame: GatewayMessage) -> bool {
        let op = frame.op;
        match tokio::time::timeout(SEND_TIMEOUT, self.outbound.send(Outbound::Frame(frame))).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                tracing::warn!(op = %op, "Transport closed, frame dropped");
                false
            }
            Err(_) => {
                tracing::warn!(op = %op, "Transport send timed out, frame dropped");
                false
            }
        }
    }

    async fn close(&mut self, reason: &CloseReason) {
        self.ctx.set_state(ConnectionState::Closing);
        tracing::info!(reason = %reason, "Closing connection");

        if let Some((code, reason)) = reason.close_frame() {
            let close = Outbound::Close { code, reason };
            if tokio::time::timeout(SEND_TIMEOUT, self.outbound.send(close))
                .await
                .map_or(true, |sent| sent.is_err())
            {
                tracing::debug!("Transport gone before close frame");
            }
        }
    }

    fn teardown(&mut self) {
        self.heartbeat = None;
        self.ctx.sequence().reset();
        self.ctx.clear(&[StateKey::VoiceNegotiating]);

        if let Some(task) = self.ctx.voice_task.take() {
            task.abort();
        }
        if self.rest.take().is_some() {
            tracing::debug!("REST client released");
        }

        self.ctx.set_state(ConnectionState::Terminated);
    }
}
