//! VOICE_STATE_UPDATE handler

use super::HandlerResult;
use crate::connection::ConnectionContext;
use crate::events::VoiceStateUpdateEvent;
use crate::protocol::GatewayMessage;

/// Replaces the user's voice state in its guild
pub struct VoiceStateHandler;

impl VoiceStateHandler {
    pub fn handle(ctx: &mut ConnectionContext, frame: &GatewayMessage) -> HandlerResult<()> {
        let state: VoiceStateUpdateEvent = frame.data_as()?;
        let (guild_id, user_id) = (state.guild_id, state.user_id);

        if ctx.update_voice_state(state) {
            tracing::debug!(guild_id = ?guild_id, user_id = %user_id, "Voice state updated");
        } else {
            tracing::debug!(user_id = %user_id, "Voice state without guild ignored");
        }
        Ok(())
    }
}
