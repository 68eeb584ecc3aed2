//! Gateway events
//!
//! Dispatch event names and the payloads this client interprets itself.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{
    GuildCreateEvent, ReadyEvent, UnavailableGuild, VoiceServerUpdateEvent, VoiceStateUpdateEvent,
};
