//! # chorus-core
//!
//! Domain layer containing ids and the entities the gateway keeps in memory.
//! This crate has zero dependencies on infrastructure (network, runtime, etc.).

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Channel, ChannelType, Guild, GuildMember, User, VoiceState};
pub use value_objects::{Snowflake, SnowflakeParseError};
