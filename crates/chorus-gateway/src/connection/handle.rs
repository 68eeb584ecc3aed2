//! Gateway handle
//!
//! Cloneable address of a running connection. Every operation is a message
//! to the connection loop; nothing here touches connection state directly.

use super::{Command, StateKey, StatePatch, StatusUpdate};
use crate::protocol::{RequestGuildMembersPayload, VoiceStateUpdatePayload};
use crate::voice::{VoiceConnectOptions, VoiceError, VoiceSession, VoiceStateOptions};
use chorus_core::Snowflake;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Errors returned by [`GatewayHandle`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("gateway connection closed")]
    Closed,

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Pending voice negotiation result
pub type VoiceListener = oneshot::Receiver<Result<VoiceSession, VoiceError>>;

/// Address of a connection
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    commands: mpsc::Sender<Command>,
}

impl GatewayHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Check if the connection loop has ended
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Read one state attribute (`null` when unset)
    pub async fn get_state(&self, key: StateKey) -> Result<Value, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetState { key, reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Merge a partial update into connection state
    pub async fn update_state(&self, patch: StatePatch) -> Result<(), ClientError> {
        self.send(Command::UpdateState(patch)).await
    }

    /// Remove the named attributes from connection state
    pub async fn clear_state(&self, keys: impl Into<Vec<StateKey>>) -> Result<(), ClientError> {
        self.send(Command::ClearState(keys.into())).await
    }

    /// Ask the server to move this account into a voice channel
    pub async fn start_voice_connection(
        &self,
        options: VoiceConnectOptions,
    ) -> Result<(), ClientError> {
        self.send(Command::StartVoiceConnection(options)).await
    }

    /// Start collecting voice events; the receiver yields the session
    ///
    /// A newer listener replaces an older one, which then fails with
    /// [`VoiceError::Cancelled`].
    pub async fn start_voice_connection_listener(&self) -> Result<VoiceListener, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartVoiceListener { reply }).await?;
        Ok(rx)
    }

    /// Send a voice state update (op 4)
    ///
    /// Returns once the frame was handed to the transport. The server's
    /// answer arrives, if at all, as VOICE_STATE_UPDATE dispatch.
    pub async fn voice_state_update(
        &self,
        guild_id: Snowflake,
        channel_id: Option<Snowflake>,
        user_id: Snowflake,
        options: VoiceStateOptions,
    ) -> Result<(), ClientError> {
        let (ack, rx) = oneshot::channel();
        let payload = VoiceStateUpdatePayload {
            guild_id,
            channel_id,
            self_mute: options.self_mute,
            self_deaf: options.self_deaf,
        };
        self.send(Command::VoiceStateUpdate {
            user_id,
            payload,
            ack,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Send a status update (op 3)
    pub async fn status_update(&self, status: StatusUpdate) -> Result<(), ClientError> {
        self.send(Command::StatusUpdate(status)).await
    }

    /// Ask for the member list of a guild (op 8)
    pub async fn request_guild_members(
        &self,
        guild_id: Snowflake,
        query: impl Into<String>,
        limit: u32,
    ) -> Result<(), ClientError> {
        self.send(Command::RequestGuildMembers(RequestGuildMembersPayload {
            guild_id,
            query: query.into(),
            limit,
        }))
        .await
    }

    /// Join a voice channel and wait for the negotiated session
    pub async fn join_voice(&self, options: VoiceConnectOptions) -> Result<VoiceSession, ClientError> {
        let listener = self.start_voice_connection_listener().await?;
        self.start_voice_connection(options).await?;

        match listener.await {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => Err(ClientError::Voice(VoiceError::ConnectionClosed)),
        }
    }

    pub(crate) fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Close the connection with a normal closure
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown).await
    }
}
