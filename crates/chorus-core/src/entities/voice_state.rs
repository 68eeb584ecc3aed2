//! Voice state entity - where a user is connected for voice

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// A user's voice connection status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// `None` once the user left voice
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub suppress: bool,
}

impl VoiceState {
    /// Check if the user is currently in a voice channel
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }
}
