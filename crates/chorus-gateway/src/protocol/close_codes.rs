//! Close codes and close reasons
//!
//! `CloseCode` classifies codes the server closes with. `CloseReason` is why
//! this client ended a connection, handed to whoever supervises it.

use serde::{Deserialize, Serialize};

/// Gateway close codes sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload encoding
    DecodeError = 4002,
    /// Sent payload before Identify
    NotAuthenticated = 4003,
    /// Invalid token provided
    AuthenticationFailed = 4004,
    /// Sent Identify twice
    AlreadyAuthenticated = 4005,
    /// Invalid sequence number for Resume
    InvalidSequence = 4007,
    /// Too many requests (rate limited)
    RateLimited = 4008,
    /// Session has timed out
    SessionTimeout = 4009,
    /// Invalid shard configuration
    InvalidShard = 4010,
    /// Sharding is required
    ShardingRequired = 4011,
    /// Invalid/outdated API version
    InvalidApiVersion = 4012,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close code
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
        )
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
            Self::InvalidShard => "Invalid shard configuration",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Server sent op 7
    Reconnect,
    /// Server sent op 9
    InvalidSession,
    /// A heartbeat went unacknowledged for a full interval
    HeartbeatStale,
    /// Transport closed from the remote side
    Remote { code: Option<u16>, reason: String },
    /// Local shutdown request
    Shutdown,
}

impl CloseReason {
    /// Close code this client puts on the frame it sends
    pub const CLIENT_CLOSE_CODE: u16 = 4000;

    /// Normal closure
    pub const NORMAL_CLOSE_CODE: u16 = 1000;

    /// Human readable reason, also used as the close frame text
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Reconnect => "server requested reconnect".to_string(),
            Self::InvalidSession => "invalid session".to_string(),
            Self::HeartbeatStale => "heartbeat stale".to_string(),
            Self::Remote { code, reason } => match code.and_then(CloseCode::from_u16) {
                Some(known) => format!("remote closed: {known}"),
                None => format!("remote closed ({}): {reason}", code.unwrap_or_default()),
            },
            Self::Shutdown => "shutdown".to_string(),
        }
    }

    /// Close frame this client sends, `None` when the transport is already gone
    #[must_use]
    pub fn close_frame(&self) -> Option<(u16, String)> {
        match self {
            Self::Remote { .. } => None,
            Self::Shutdown => Some((Self::NORMAL_CLOSE_CODE, self.description())),
            _ => Some((Self::CLIENT_CLOSE_CODE, self.description())),
        }
    }

    /// Check if a fresh connection is worth attempting
    #[must_use]
    pub fn should_restart(&self) -> bool {
        match self {
            Self::Shutdown => false,
            Self::Remote { code, .. } => code
                .and_then(CloseCode::from_u16)
                .map_or(true, CloseCode::should_reconnect),
            _ => true,
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}
