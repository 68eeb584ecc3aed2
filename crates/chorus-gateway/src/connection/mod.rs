//! Gateway connection
//!
//! The connection task, the state it owns and the handle used to talk to it.

mod actor;
mod command;
mod context;
mod handle;
mod heartbeat;
mod sequence;
mod session;
mod state;

use std::time::Duration;

/// Upper bound for handing one message to the transport
pub(crate) const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub use actor::ConnectionExit;
pub(crate) use actor::{Collaborators, Connection, ConnectionConfig, SpawnedConnection};
pub(crate) use command::Command;
pub use command::StatusUpdate;
pub use context::{ConnectionContext, StateKey, StatePatch};
pub use handle::{ClientError, GatewayHandle, VoiceListener};
pub use heartbeat::{HeartbeatMonitor, HeartbeatStale};
pub use sequence::SequenceTracker;
pub use session::Session;
pub use state::ConnectionState;

pub use crate::protocol::CloseReason;
