//! Payload definitions
//!
//! Defines the `d` payload structures for control messages in both directions.

use chorus_core::Snowflake;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to start a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot credential
    pub token: String,

    /// Client connection properties
    pub properties: IdentifyProperties,

    /// Payload compression is never requested
    pub compress: bool,

    /// Member count above which the server omits offline members
    pub large_threshold: u32,
}

impl IdentifyPayload {
    /// Member count above which a guild is considered large
    pub const DEFAULT_LARGE_THRESHOLD: u32 = 250;

    /// Create an Identify payload with this client's properties
    #[must_use]
    pub fn new(token: impl Into<String>, large_threshold: u32) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::current(),
            compress: false,
            large_threshold,
        }
    }
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(rename = "$os")]
    pub os: String,

    /// Library name
    #[serde(rename = "$browser")]
    pub browser: String,

    /// Library name
    #[serde(rename = "$device")]
    pub device: String,

    #[serde(rename = "$referrer")]
    pub referrer: String,

    #[serde(rename = "$referring_domain")]
    pub referring_domain: String,
}

impl IdentifyProperties {
    /// Properties describing this client
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "chorus".to_string(),
            device: "chorus".to_string(),
            referrer: String::new(),
            referring_domain: String::new(),
        }
    }
}

/// Payload for op 3 (Status Update)
///
/// Absent fields are sent as `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// Unix time in milliseconds since the client went idle
    pub idle_since: Option<i64>,

    /// Activity shown under the user name
    pub game: Option<Activity>,
}

/// Activity shown in a status update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
}

/// Payload for op 4 (Voice State Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdatePayload {
    pub guild_id: Snowflake,

    /// `None` disconnects from voice in this guild
    pub channel_id: Option<Snowflake>,

    pub self_mute: bool,

    pub self_deaf: bool,
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,

    /// Username prefix, empty for everyone
    pub query: String,

    /// Maximum number of members to send, 0 for no limit
    pub limit: u32,
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to resume a disconnected session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Bot credential
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}
