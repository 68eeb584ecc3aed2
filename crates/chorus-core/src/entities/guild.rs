//! Guild entity - one roster entry per server the account is in

use serde::{Deserialize, Serialize};

use super::{Channel, GuildMember, VoiceState};
use crate::value_objects::Snowflake;

/// Guild (server) roster entry
///
/// `voice_states` is kept in arrival order with at most one entry per user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<GuildMember>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}

impl Guild {
    /// Create an empty Guild
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            name: None,
            members: Vec::new(),
            channels: Vec::new(),
            voice_states: Vec::new(),
        }
    }

    /// Replace the voice state for `state.user_id`
    ///
    /// The previous entry for that user is dropped and the new one appended.
    pub fn upsert_voice_state(&mut self, state: VoiceState) {
        self.voice_states.retain(|existing| existing.user_id != state.user_id);
        self.voice_states.push(state);
    }

    /// Find the voice state of a user
    pub fn voice_state(&self, user_id: Snowflake) -> Option<&VoiceState> {
        self.voice_states.iter().find(|s| s.user_id == user_id)
    }

    /// Find a channel by id
    pub fn channel(&self, channel_id: Snowflake) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    /// Find a member by user id
    pub fn member(&self, user_id: Snowflake) -> Option<&GuildMember> {
        self.members.iter().find(|m| m.user.id == user_id)
    }
}
