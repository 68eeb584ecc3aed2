//! Connection lifecycle states

use serde::{Deserialize, Serialize};

/// Connection state
///
/// `Connecting -> AwaitingHello -> Identified -> SteadyState -> Closing -> Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport is up, Identify not sent yet
    Connecting,
    /// Identify sent, waiting for Hello
    AwaitingHello,
    /// Hello received, heartbeat running
    Identified,
    /// READY received
    SteadyState,
    /// Close decided, tearing down
    Closing,
    /// Torn down
    Terminated,
}

impl ConnectionState {
    /// Get the name of this state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identified => "identified",
            Self::SteadyState => "steady_state",
            Self::Closing => "closing",
            Self::Terminated => "terminated",
        }
    }

    /// Check if the connection still accepts frames
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closing | Self::Terminated)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
