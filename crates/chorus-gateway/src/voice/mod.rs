//! Voice session negotiation
//!
//! A voice connection needs two facts the server delivers separately:
//! VOICE_SERVER_UPDATE (endpoint and token) and the bot's own
//! VOICE_STATE_UPDATE (session id). A negotiation task collects both and
//! hands the finished [`VoiceSession`] to whoever asked for it.

mod accumulator;
mod negotiation;

pub use accumulator::{KnownVoice, VoiceAccumulator};
pub(crate) use negotiation::{spawn_negotiation, VoiceNegotiationHandle};

use async_trait::async_trait;
use chorus_core::Snowflake;
use serde::{Deserialize, Serialize};

/// Completed voice session descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSession {
    pub endpoint: String,
    pub token: String,
    pub session_id: String,
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
}

/// Request to join a voice channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConnectOptions {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl VoiceConnectOptions {
    /// Join unmuted and deafened
    #[must_use]
    pub fn new(guild_id: Snowflake, channel_id: Snowflake) -> Self {
        let flags = VoiceStateOptions::default();
        Self {
            guild_id,
            channel_id,
            self_mute: flags.self_mute,
            self_deaf: flags.self_deaf,
        }
    }

    #[must_use]
    pub fn self_mute(mut self, self_mute: bool) -> Self {
        self.self_mute = self_mute;
        self
    }

    #[must_use]
    pub fn self_deaf(mut self, self_deaf: bool) -> Self {
        self.self_deaf = self_deaf;
        self
    }

    /// Mute and deafen flags of this request
    #[must_use]
    pub fn flags(&self) -> VoiceStateOptions {
        VoiceStateOptions {
            self_mute: self.self_mute,
            self_deaf: self.self_deaf,
        }
    }
}

/// Self mute/deafen flags of a voice state update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateOptions {
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl Default for VoiceStateOptions {
    fn default() -> Self {
        Self {
            self_mute: false,
            self_deaf: true,
        }
    }
}

/// Voice negotiation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("voice negotiation timed out")]
    Timeout,

    #[error("voice negotiation cancelled")]
    Cancelled,

    #[error("gateway connection closed")]
    ConnectionClosed,

    #[error("voice transport error: {0}")]
    Transport(String),
}

/// External voice transport
///
/// Receives a negotiated session and establishes the audio connection.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, session: VoiceSession) -> Result<(), VoiceError>;
}
