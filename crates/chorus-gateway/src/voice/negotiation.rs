//! Voice negotiation task
//!
//! One task per `start-voice-connection-listener` request. The connection
//! forwards correlated frames to it; the task answers the requester once the
//! session is complete, the deadline passes, or the connection drops it.

use super::{KnownVoice, VoiceAccumulator, VoiceError, VoiceSession};
use crate::connection::{Command, StatePatch};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};

/// Frame data forwarded to a negotiation, with the connection's known values
#[derive(Debug)]
struct VoiceFrame {
    data: Value,
    known: KnownVoice,
}

/// Connection-side handle of a running negotiation
///
/// Dropping the handle cancels the negotiation.
#[derive(Debug)]
pub(crate) struct VoiceNegotiationHandle {
    id: u64,
    frames: mpsc::UnboundedSender<VoiceFrame>,
}

impl VoiceNegotiationHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Forward a correlated event's data; false if the task already ended
    pub(crate) fn forward(&self, data: Value, known: KnownVoice) -> bool {
        self.frames.send(VoiceFrame { data, known }).is_ok()
    }
}

/// Spawn a negotiation that reports back to the connection mailbox
pub(crate) fn spawn_negotiation(
    id: u64,
    timeout: Duration,
    commands: mpsc::Sender<Command>,
    reply: oneshot::Sender<Result<VoiceSession, VoiceError>>,
) -> VoiceNegotiationHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let deadline = Instant::now() + timeout;

    tokio::spawn(async move {
        let result = accumulate(deadline, rx).await;

        match &result {
            Ok(session) => {
                tracing::info!(
                    guild_id = ?session.guild_id,
                    endpoint = %session.endpoint,
                    "Voice negotiation complete"
                );
                let patch = StatePatch::default()
                    .endpoint(session.endpoint.clone())
                    .voice_token(session.token.clone());
                let _ = commands.send(Command::UpdateState(patch)).await;
            }
            Err(e) => tracing::warn!(negotiation = id, error = %e, "Voice negotiation failed"),
        }

        let _ = commands.send(Command::VoiceNegotiationFinished { id }).await;

        if reply.send(result).is_err() {
            tracing::debug!(negotiation = id, "Voice negotiation requester went away");
        }
    });

    VoiceNegotiationHandle { id, frames: tx }
}

async fn accumulate(
    deadline: Instant,
    mut frames: mpsc::UnboundedReceiver<VoiceFrame>,
) -> Result<VoiceSession, VoiceError> {
    let mut accumulator = VoiceAccumulator::new();

    loop {
        let frame = match timeout_at(deadline, frames.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(VoiceError::Cancelled),
            Err(_) => return Err(VoiceError::Timeout),
        };

        accumulator.merge(&frame.data);
        if let Some(session) = accumulator.complete(&frame.known) {
            return Ok(session);
        }
        tracing::debug!("Voice negotiation waiting for more events");
    }
}
