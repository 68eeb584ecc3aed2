//! Connection mailbox messages

use super::{StateKey, StatePatch};
use crate::protocol::{Activity, RequestGuildMembersPayload, StatusUpdatePayload, VoiceStateUpdatePayload};
use crate::voice::{VoiceConnectOptions, VoiceError, VoiceSession};
use chorus_core::Snowflake;
use serde_json::Value;
use tokio::sync::oneshot;

/// Presence change sent with op 3
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Unix time in milliseconds since the client went idle, `None` if active
    pub idle_since: Option<i64>,
    /// Game name shown under the user name
    pub game: Option<String>,
}

impl StatusUpdate {
    /// Active, playing `game`
    pub fn playing(game: impl Into<String>) -> Self {
        Self {
            idle_since: None,
            game: Some(game.into()),
        }
    }

    /// Idle from now on
    pub fn idle_now() -> Self {
        Self {
            idle_since: Some(chrono::Utc::now().timestamp_millis()),
            game: None,
        }
    }

    #[must_use]
    pub fn with_game(mut self, game: impl Into<String>) -> Self {
        self.game = Some(game.into());
        self
    }

    pub(crate) fn into_payload(self) -> StatusUpdatePayload {
        StatusUpdatePayload {
            idle_since: self.idle_since,
            game: self.game.map(|name| Activity { name }),
        }
    }
}

/// Messages accepted by the connection loop
#[derive(Debug)]
pub(crate) enum Command {
    GetState {
        key: StateKey,
        reply: oneshot::Sender<Value>,
    },
    UpdateState(StatePatch),
    ClearState(Vec<StateKey>),
    StartVoiceConnection(VoiceConnectOptions),
    StartVoiceListener {
        reply: oneshot::Sender<Result<VoiceSession, VoiceError>>,
    },
    VoiceStateUpdate {
        user_id: Snowflake,
        payload: VoiceStateUpdatePayload,
        ack: oneshot::Sender<()>,
    },
    StatusUpdate(StatusUpdate),
    RequestGuildMembers(RequestGuildMembersPayload),
    VoiceNegotiationFinished {
        id: u64,
    },
    Shutdown,
}
