//! Gateway protocol definitions
//!
//! Defines the wire protocol including op codes, frame format, payloads, and close codes.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, CloseReason};
pub use messages::{FrameError, GatewayMessage};
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembersPayload,
    ResumePayload, StatusUpdatePayload, VoiceStateUpdatePayload,
};
