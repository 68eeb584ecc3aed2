//! READY handler

use super::{HandlerResult, InitialVoice};
use crate::connection::{ConnectionContext, ConnectionState};
use crate::events::ReadyEvent;
use crate::protocol::GatewayMessage;

/// Stores the session and kicks off the initial voice connection
pub struct ReadyHandler;

impl ReadyHandler {
    pub fn handle(
        ctx: &mut ConnectionContext,
        frame: &GatewayMessage,
        initial_voice: &InitialVoice,
    ) -> HandlerResult<()> {
        let ready: ReadyEvent = frame.data_as()?;

        tracing::info!(
            session_id = %ready.session_id,
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "Session ready"
        );

        ctx.session_mut().set_session_id(ready.session_id);
        ctx.set_state(ConnectionState::SteadyState);

        if let Some(options) = ctx.pending_voice.take() {
            if let Some(previous) = ctx.voice_task.replace(initial_voice.spawn(options)) {
                previous.abort();
            }
        }

        Ok(())
    }
}
