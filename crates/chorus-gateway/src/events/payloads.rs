//! Event payload definitions
//!
//! Typed views of the dispatch payloads the client handles itself.
//! Everything else reaches event handlers as raw JSON.

use chorus_core::{Channel, Guild, GuildMember, Snowflake, User, VoiceState};
use serde::{Deserialize, Serialize};

/// READY event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,
    /// Current user
    pub user: User,
    /// Guilds the user is in (arrive later as GUILD_CREATE)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    /// Session ID for resuming
    pub session_id: String,
}

/// Guild placeholder in READY
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// GUILD_CREATE event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildCreateEvent {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<GuildMember>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
    #[serde(default)]
    pub unavailable: bool,
}

impl GuildCreateEvent {
    /// Build the roster entry for this guild
    ///
    /// Voice states inside GUILD_CREATE omit their guild id; it is filled in here.
    pub fn into_guild(self) -> Guild {
        let mut guild = Guild::new(self.id);
        guild.name = self.name;
        guild.members = self.members;
        guild.channels = self.channels;
        for mut state in self.voice_states {
            state.guild_id.get_or_insert(self.id);
            guild.upsert_voice_state(state);
        }
        guild
    }
}

/// VOICE_STATE_UPDATE event data
pub type VoiceStateUpdateEvent = VoiceState;

/// VOICE_SERVER_UPDATE event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceServerUpdateEvent {
    /// Voice connection token
    pub token: String,
    pub guild_id: Snowflake,
    /// Voice server host; `None` while the server is being reallocated
    #[serde(default)]
    pub endpoint: Option<String>,
}
