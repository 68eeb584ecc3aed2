//! Connection context
//!
//! Everything a connection knows about its session: identity, guild roster,
//! voice credentials and the pending voice negotiation. Only the connection
//! loop mutates it; other tasks read it through `get-state` requests.

use super::{ConnectionState, SequenceTracker, Session};
use crate::voice::{KnownVoice, VoiceConnectOptions, VoiceNegotiationHandle};
use chorus_core::{Guild, Snowflake, VoiceState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Named attribute of connection state, used by get/clear requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    State,
    UserId,
    SessionId,
    Sequence,
    Guilds,
    Endpoint,
    VoiceToken,
    VoiceNegotiating,
    PendingVoice,
}

impl StateKey {
    /// Check if `clear-state` may remove this key
    #[must_use]
    pub const fn is_clearable(self) -> bool {
        matches!(
            self,
            Self::SessionId
                | Self::Guilds
                | Self::Endpoint
                | Self::VoiceToken
                | Self::VoiceNegotiating
                | Self::PendingVoice
        )
    }
}

/// Partial update merged into connection state (last writer wins per field)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_token: Option<String>,
}

impl StatePatch {
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn voice_token(mut self, voice_token: impl Into<String>) -> Self {
        self.voice_token = Some(voice_token.into());
        self
    }

    /// Check if the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.endpoint.is_none() && self.voice_token.is_none()
    }
}

/// State owned by one connection
pub struct ConnectionContext {
    state: watch::Sender<ConnectionState>,
    session: Session,
    sequence: SequenceTracker,
    guilds: Vec<Guild>,
    endpoint: Option<String>,
    voice_token: Option<String>,
    pub(crate) voice: Option<VoiceNegotiationHandle>,
    pub(crate) pending_voice: Option<VoiceConnectOptions>,
    pub(crate) voice_task: Option<JoinHandle<()>>,
}

impl ConnectionContext {
    /// Create the context for a fresh connection
    pub fn new(session: Session, pending_voice: Option<VoiceConnectOptions>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            state,
            session,
            sequence: SequenceTracker::new(),
            guilds: Vec::new(),
            endpoint: None,
            voice_token: None,
            voice: None,
            pending_voice,
            voice_task: None,
        }
    }

    // === Accessors ===

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Id of the authenticated account
    pub fn user_id(&self) -> Snowflake {
        self.session.user_id()
    }

    /// Shared sequence tracker of this connection
    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    /// Guild roster in GUILD_CREATE order
    pub fn guilds(&self) -> &[Guild] {
        &self.guilds
    }

    pub fn guild(&self, guild_id: Snowflake) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.id == guild_id)
    }

    /// Last voice server endpoint
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Last voice token
    pub fn voice_token(&self) -> Option<&str> {
        self.voice_token.as_deref()
    }

    /// Check if a voice negotiation is waiting for events
    pub fn is_negotiating_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub(crate) fn known_voice(&self) -> KnownVoice {
        KnownVoice {
            endpoint: self.endpoint.clone(),
            token: self.voice_token.clone(),
        }
    }

    // === Mutations (connection loop only) ===

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Add a guild from GUILD_CREATE, replacing an entry with the same id
    pub(crate) fn add_guild(&mut self, guild: Guild) {
        match self.guilds.iter_mut().find(|g| g.id == guild.id) {
            Some(existing) => *existing = guild,
            None => self.guilds.push(guild),
        }
    }

    /// Apply a voice state to its guild; other guilds are untouched
    pub(crate) fn update_voice_state(&mut self, state: VoiceState) -> bool {
        let Some(guild_id) = state.guild_id else {
            return false;
        };

        match self.guilds.iter_mut().find(|g| g.id == guild_id) {
            Some(guild) => guild.upsert_voice_state(state),
            None => {
                let mut guild = Guild::new(guild_id);
                guild.upsert_voice_state(state);
                self.guilds.push(guild);
            }
        }
        true
    }

    // === get-state / update-state / clear-state ===

    /// Read one attribute as JSON (`null` when unset)
    pub fn get(&self, key: StateKey) -> Value {
        match key {
            StateKey::State => json!(self.state().as_str()),
            StateKey::UserId => json!(self.user_id()),
            StateKey::SessionId => json!(self.session.session_id()),
            StateKey::Sequence => json!(self.sequence.get()),
            StateKey::Guilds => serde_json::to_value(&self.guilds).unwrap_or(Value::Null),
            StateKey::Endpoint => json!(self.endpoint),
            StateKey::VoiceToken => json!(self.voice_token),
            StateKey::VoiceNegotiating => json!(self.is_negotiating_voice()),
            StateKey::PendingVoice => {
                serde_json::to_value(self.pending_voice).unwrap_or(Value::Null)
            }
        }
    }

    /// Merge a partial update
    pub(crate) fn apply(&mut self, patch: StatePatch) {
        if let Some(session_id) = patch.session_id {
            self.session.set_session_id(session_id);
        }
        if let Some(endpoint) = patch.endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(voice_token) = patch.voice_token {
            self.voice_token = Some(voice_token);
        }
    }

    /// Remove the named attributes
    pub(crate) fn clear(&mut self, keys: &[StateKey]) {
        for key in keys {
            match key {
                StateKey::SessionId => self.session.clear_session_id(),
                StateKey::Guilds => self.guilds.clear(),
                StateKey::Endpoint => self.endpoint = None,
                StateKey::VoiceToken => self.voice_token = None,
                StateKey::VoiceNegotiating => {
                    // Dropping the handle cancels the negotiation task
                    self.voice = None;
                }
                StateKey::PendingVoice => self.pending_voice = None,
                other => {
                    tracing::debug!(key = ?other, "Ignoring clear of read-only state key");
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("state", &self.state())
            .field("session", &self.session)
            .field("sequence", &self.sequence.get())
            .field("guilds", &self.guilds.len())
            .field("negotiating_voice", &self.is_negotiating_voice())
            .finish()
    }
}
