//! External event handler
//!
//! Handlers run on their own task, fed in frame order by the router. The
//! connection loop never waits for them, so a handler may call back into the
//! connection through [`EventContext::handle`] and await the answer.

use super::HandlerResult;
use crate::connection::{ConnectionState, GatewayHandle, SequenceTracker};
use crate::events::GatewayEventType;
use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use chorus_core::Snowflake;
use tokio::sync::mpsc;

/// Business logic invoked for dispatch events
///
/// Implementations keep their own state behind `&self`. Connection state
/// changes go through the handle: `update_state`, `clear_state` and the
/// other control messages.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(
        &self,
        event: &GatewayEventType,
        frame: &GatewayMessage,
        ctx: &EventContext,
    ) -> HandlerResult<()>;
}

/// Connection view handed to an event handler
#[derive(Debug, Clone)]
pub struct EventContext {
    handle: GatewayHandle,
    sequence: SequenceTracker,
    user_id: Snowflake,
    session_id: Option<String>,
    state: ConnectionState,
}

impl EventContext {
    pub(crate) fn new(
        handle: GatewayHandle,
        sequence: SequenceTracker,
        user_id: Snowflake,
        session_id: Option<String>,
        state: ConnectionState,
    ) -> Self {
        Self {
            handle,
            sequence,
            user_id,
            session_id,
            state,
        }
    }

    /// Mailbox of the connection that received the event
    pub fn handle(&self) -> &GatewayHandle {
        &self.handle
    }

    /// Live sequence tracker of the connection
    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    /// Session id when the event was routed
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Connection state when the event was routed
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

struct HandlerJob {
    event: GatewayEventType,
    frame: GatewayMessage,
    ctx: EventContext,
}

/// Ordered queue in front of an event handler task
///
/// Dropping the queue lets the task finish the queued events and exit.
pub(crate) struct HandlerQueue {
    jobs: mpsc::UnboundedSender<HandlerJob>,
}

impl HandlerQueue {
    pub(crate) fn spawn(handler: std::sync::Arc<dyn EventHandler>) -> Self {
        let (jobs, mut rx) = mpsc::unbounded_channel::<HandlerJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = handler.handle_event(&job.event, &job.frame, &job.ctx).await {
                    tracing::warn!(event = %job.event.normalized(), error = %e, "Event handler failed");
                }
            }
            tracing::debug!("Event handler queue drained");
        });

        Self { jobs }
    }

    /// Queue an event; false once the handler task is gone
    pub(crate) fn push(&self, event: GatewayEventType, frame: GatewayMessage, ctx: EventContext) -> bool {
        self.jobs.send(HandlerJob { event, frame, ctx }).is_ok()
    }
}

/// Handler that only logs what it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_event(
        &self,
        event: &GatewayEventType,
        frame: &GatewayMessage,
        ctx: &EventContext,
    ) -> HandlerResult<()> {
        tracing::info!(
            event = %event.normalized(),
            sequence = ?frame.s,
            session_id = ?ctx.session_id(),
            "Event received"
        );
        Ok(())
    }
}
