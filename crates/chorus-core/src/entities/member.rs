//! Guild member entity - a user's membership in a guild

use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Guild member as delivered in `GUILD_CREATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

impl GuildMember {
    /// Get the display name (nickname or username)
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.username)
    }
}
