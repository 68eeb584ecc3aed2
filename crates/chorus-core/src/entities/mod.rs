//! Domain entities - what the gateway tracks about the remote service

mod channel;
mod guild;
mod member;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelType};
pub use guild::Guild;
pub use member::GuildMember;
pub use user::User;
pub use voice_state::VoiceState;
