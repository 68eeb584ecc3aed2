//! Voice field accumulator

use super::VoiceSession;
use chorus_core::Snowflake;
use serde_json::Value;

/// Endpoint and token the connection already knows from earlier negotiations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownVoice {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

/// Fields collected from correlated voice events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAccumulator {
    endpoint: Option<String>,
    token: Option<String>,
    session_id: Option<String>,
    guild_id: Option<Snowflake>,
    channel_id: Option<Snowflake>,
}

impl VoiceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the data of a voice event; present fields overwrite older ones
    pub fn merge(&mut self, data: &Value) {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_owned);
        let id = |key: &str| {
            data.get(key)
                .filter(|v| !v.is_null())
                .and_then(|v| serde_json::from_value::<Snowflake>(v.clone()).ok())
        };

        if let Some(endpoint) = text("endpoint") {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = text("token") {
            self.token = Some(token);
        }
        if let Some(session_id) = text("session_id") {
            self.session_id = Some(session_id);
        }
        if let Some(guild_id) = id("guild_id") {
            self.guild_id = Some(guild_id);
        }
        if let Some(channel_id) = id("channel_id") {
            self.channel_id = Some(channel_id);
        }
    }

    /// Build the session once token, session id and endpoint are all known
    pub fn complete(&self, known: &KnownVoice) -> Option<VoiceSession> {
        let endpoint = self.endpoint.as_ref().or(known.endpoint.as_ref())?;
        let token = self.token.as_ref().or(known.token.as_ref())?;
        let session_id = self.session_id.as_ref()?;

        Some(VoiceSession {
            endpoint: endpoint.clone(),
            token: token.clone(),
            session_id: session_id.clone(),
            guild_id: self.guild_id,
            channel_id: self.channel_id,
        })
    }
}
