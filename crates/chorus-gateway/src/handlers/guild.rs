//! GUILD_CREATE handler

use super::HandlerResult;
use crate::connection::ConnectionContext;
use crate::events::GuildCreateEvent;
use crate::protocol::GatewayMessage;

/// Adds the guild to the roster
pub struct GuildCreateHandler;

impl GuildCreateHandler {
    pub fn handle(ctx: &mut ConnectionContext, frame: &GatewayMessage) -> HandlerResult<()> {
        let event: GuildCreateEvent = frame.data_as()?;
        let guild = event.into_guild();

        tracing::debug!(
            guild_id = %guild.id,
            members = guild.members.len(),
            channels = guild.channels.len(),
            voice_states = guild.voice_states.len(),
            "Guild available"
        );

        ctx.add_guild(guild);
        Ok(())
    }
}
