//! Dispatch routing
//!
//! Turns dispatch frames into event identifiers, applies the built-in side
//! effects of static events and forwards the rest to the external handler.

mod error;
mod event_handler;
mod guild;
mod ready;
mod voice_state;

pub use error::{HandlerError, HandlerResult};
pub use event_handler::{EventContext, EventHandler, LoggingEventHandler};
pub(crate) use event_handler::HandlerQueue;
pub use guild::GuildCreateHandler;
pub use ready::ReadyHandler;
pub use voice_state::VoiceStateHandler;

use crate::connection::{ConnectionContext, GatewayHandle};
use crate::events::GatewayEventType;
use crate::protocol::GatewayMessage;
use crate::voice::{VoiceConnectOptions, VoiceConnector};
use chorus_core::Snowflake;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Voice connection started once READY arrives
#[derive(Clone)]
pub struct InitialVoice {
    handle: GatewayHandle,
    settle_delay: Duration,
    connector: Option<Arc<dyn VoiceConnector>>,
}

impl InitialVoice {
    pub(crate) fn new(
        handle: GatewayHandle,
        settle_delay: Duration,
        connector: Option<Arc<dyn VoiceConnector>>,
    ) -> Self {
        Self {
            handle,
            settle_delay,
            connector,
        }
    }

    /// Wait for the server to provision voice, then negotiate and connect
    pub(crate) fn spawn(&self, options: VoiceConnectOptions) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(this.settle_delay).await;

            tracing::info!(
                guild_id = %options.guild_id,
                channel_id = %options.channel_id,
                "Joining initial voice channel"
            );

            let session = match this.handle.join_voice(options).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(guild_id = %options.guild_id, error = %e, "Initial voice join failed");
                    return;
                }
            };

            match &this.connector {
                Some(connector) => {
                    if let Err(e) = connector.connect(session).await {
                        tracing::warn!(guild_id = %options.guild_id, error = %e, "Voice transport failed");
                    }
                }
                None => tracing::info!(
                    guild_id = %options.guild_id,
                    endpoint = %session.endpoint,
                    "Voice session negotiated, no voice connector configured"
                ),
            }
        })
    }
}

impl std::fmt::Debug for InitialVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitialVoice")
            .field("settle_delay", &self.settle_delay)
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

/// Routes dispatch frames for one connection
pub struct DispatchRouter {
    handler: Option<HandlerQueue>,
    initial_voice: InitialVoice,
}

impl DispatchRouter {
    /// Must be called inside a runtime; the external handler gets its own task
    pub(crate) fn new(handler: Option<Arc<dyn EventHandler>>, initial_voice: InitialVoice) -> Self {
        Self {
            handler: handler.map(HandlerQueue::spawn),
            initial_voice,
        }
    }

    /// Route one dispatch frame
    ///
    /// The sequence number must already be recorded. Never waits on the
    /// external handler.
    pub fn route(&self, ctx: &mut ConnectionContext, frame: &GatewayMessage) {
        let Some(name) = frame.event_name() else {
            return;
        };
        let event = GatewayEventType::from_name(name);

        tracing::debug!(event = %event.normalized(), sequence = ?frame.s, "Routing dispatch");

        Self::correlate_voice(ctx, &event, frame);

        let result = match event {
            GatewayEventType::Ready => ReadyHandler::handle(ctx, frame, &self.initial_voice),
            GatewayEventType::GuildCreate => {
                if let Err(e) = GuildCreateHandler::handle(ctx, frame) {
                    tracing::warn!(event = %event.normalized(), error = %e, "Guild not added");
                }
                self.forward(event.clone(), frame, ctx);
                Ok(())
            }
            GatewayEventType::VoiceStateUpdate => VoiceStateHandler::handle(ctx, frame),
            _ => {
                self.forward(event.clone(), frame, ctx);
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(event = %event.normalized(), error = %e, "Event handling failed");
        }
    }

    fn forward(&self, event: GatewayEventType, frame: &GatewayMessage, ctx: &ConnectionContext) {
        let Some(queue) = &self.handler else {
            tracing::debug!(event = %event.normalized(), "Event received, no handler configured");
            return;
        };

        let view = EventContext::new(
            self.initial_voice.handle.clone(),
            ctx.sequence().clone(),
            ctx.user_id(),
            ctx.session().session_id().map(str::to_owned),
            ctx.state(),
        );
        let name = event.normalized();
        if !queue.push(event, frame.clone(), view) {
            tracing::warn!(event = %name, "Event handler task is gone, event dropped");
        }
    }

    /// Feed voice events to an active negotiation
    ///
    /// VOICE_STATE_UPDATE fires for every user; only our own carries the
    /// session id the negotiation needs.
    fn correlate_voice(ctx: &mut ConnectionContext, event: &GatewayEventType, frame: &GatewayMessage) {
        if !event.is_voice_negotiation() {
            return;
        }
        let Some(negotiation) = ctx.voice.as_ref() else {
            return;
        };

        let data = frame.d.clone().unwrap_or(Value::Null);
        if *event == GatewayEventType::VoiceStateUpdate {
            let user_id = data
                .get("user_id")
                .and_then(|v| serde_json::from_value::<Snowflake>(v.clone()).ok());
            if user_id != Some(ctx.user_id()) {
                return;
            }
        }

        let id = negotiation.id();
        if negotiation.forward(data, ctx.known_voice()) {
            tracing::debug!(negotiation = id, event = %event.normalized(), "Forwarded voice event");
        } else {
            ctx.voice = None;
        }
    }
}
