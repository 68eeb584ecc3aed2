//! Gateway message format
//!
//! Defines the frame structure shared by every message on the connection.

use super::{
    HelloPayload, IdentifyPayload, OpCode, RequestGuildMembersPayload, ResumePayload,
    StatusUpdatePayload, VoiceStateUpdatePayload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message format
///
/// All messages sent over the gateway connection follow this format.
/// `t` is present if and only if `op` is Dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Option<Value>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Frame shape violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("dispatch frame without event name")]
    MissingEventName,

    #[error("{0} frame carries an event name")]
    UnexpectedEventName(OpCode),

    #[error("malformed {op} payload: {reason}")]
    MalformedPayload { op: OpCode, reason: String },
}

impl GatewayMessage {
    fn control(op: OpCode, d: Option<Value>) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn with_payload(op: OpCode, payload: &impl Serialize) -> Self {
        // Payload types are plain structs of strings, numbers and options
        Self::control(op, serde_json::to_value(payload).ok())
    }

    // === Client Messages ===

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::with_payload(OpCode::Identify, payload)
    }

    /// Create a Heartbeat message (op=1) carrying the last sequence number
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, Some(last_sequence.map_or(Value::Null, Value::from)))
    }

    /// Create a Status Update message (op=3)
    #[must_use]
    pub fn status_update(payload: &StatusUpdatePayload) -> Self {
        Self::with_payload(OpCode::StatusUpdate, payload)
    }

    /// Create a Voice State Update message (op=4)
    #[must_use]
    pub fn voice_state_update(payload: &VoiceStateUpdatePayload) -> Self {
        Self::with_payload(OpCode::VoiceStateUpdate, payload)
    }

    /// Create a Request Guild Members message (op=8)
    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Self {
        Self::with_payload(OpCode::RequestGuildMembers, payload)
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::with_payload(OpCode::Resume, payload)
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            s: Some(sequence),
            t: Some(event_name.into()),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::with_payload(OpCode::Hello, &HelloPayload { heartbeat_interval })
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, None)
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, None)
    }

    /// Create an Invalid Session message (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    // === Parsing ===

    /// Check the event-name/opcode invariant
    pub fn validate(&self) -> Result<(), FrameError> {
        match (self.op, &self.t) {
            (OpCode::Dispatch, None) => Err(FrameError::MissingEventName),
            (OpCode::Dispatch, Some(_)) | (_, None) => Ok(()),
            (op, Some(_)) => Err(FrameError::UnexpectedEventName(op)),
        }
    }

    /// Decode the `d` payload into a typed structure
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        let data = self.d.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| FrameError::MalformedPayload {
            op: self.op,
            reason: e.to_string(),
        })
    }

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.data_as().ok()
    }

    /// Event name of a dispatch frame
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
