//! Heartbeat monitor
//!
//! Beats on the interval from HELLO with the last sequence number. If a beat
//! is still unacknowledged when the next one is due, the monitor signals
//! staleness once and stops; closing the connection is the owner's job.

use super::{SequenceTracker, SEND_TIMEOUT};
use crate::protocol::GatewayMessage;
use crate::transport::Outbound;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
enum Control {
    Ack,
    BeatNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Beat {
    Sent,
    /// Writer did not take the frame within the send timeout
    Stalled,
    TransportClosed,
}

/// Staleness notification sent to the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStale;

/// Handle to a running heartbeat task; dropping it stops the task
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl HeartbeatMonitor {
    /// Start beating; the first beat is one interval from now
    pub fn spawn(
        interval: Duration,
        sequence: SequenceTracker,
        outbound: mpsc::Sender<Outbound>,
        stale: mpsc::Sender<HeartbeatStale>,
    ) -> Self {
        let (control, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(interval, sequence, outbound, stale, control_rx));

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Heartbeat monitor started");

        Self {
            interval,
            control,
            task,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a heartbeat ACK
    pub fn ack(&self) {
        let _ = self.control.send(Control::Ack);
    }

    /// Send one heartbeat now without touching the ack bookkeeping
    pub fn beat_now(&self) {
        let _ = self.control.send(Control::BeatNow);
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    period: Duration,
    sequence: SequenceTracker,
    outbound: mpsc::Sender<Outbound>,
    stale: mpsc::Sender<HeartbeatStale>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first beat has nothing to be acknowledged
    let mut awaiting_ack = false;

    loop {
        tokio::select! {
            biased;

            msg = control.recv() => match msg {
                Some(Control::Ack) => awaiting_ack = false,
                Some(Control::BeatNow) => match beat(&sequence, &outbound).await {
                    Beat::Sent => {}
                    Beat::Stalled => return signal_stale(&stale).await,
                    Beat::TransportClosed => return,
                },
                None => return,
            },

            _ = ticker.tick() => {
                if awaiting_ack {
                    tracing::warn!(
                        interval_ms = period.as_millis() as u64,
                        "Heartbeat not acknowledged, connection is stale"
                    );
                    return signal_stale(&stale).await;
                }
                match beat(&sequence, &outbound).await {
                    Beat::Sent => awaiting_ack = true,
                    Beat::Stalled => return signal_stale(&stale).await,
                    Beat::TransportClosed => return,
                }
            }
        }
    }
}

async fn signal_stale(stale: &mpsc::Sender<HeartbeatStale>) {
    let _ = stale.send(HeartbeatStale).await;
}

async fn beat(sequence: &SequenceTracker, outbound: &mpsc::Sender<Outbound>) -> Beat {
    let last = sequence.get();
    tracing::trace!(sequence = ?last, "Sending heartbeat");

    let frame = Outbound::Frame(GatewayMessage::heartbeat(last));
    match tokio::time::timeout(SEND_TIMEOUT, outbound.send(frame)).await {
        Ok(Ok(())) => Beat::Sent,
        Ok(Err(_)) => Beat::TransportClosed,
        Err(_) => {
            tracing::warn!(sequence = ?last, "Heartbeat stuck in transport");
            Beat::Stalled
        }
    }
}
