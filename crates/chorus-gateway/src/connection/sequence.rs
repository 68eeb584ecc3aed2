//! Sequence tracker
//!
//! Last sequence number seen on a dispatch frame. Written by the connection
//! loop and read by the heartbeat monitor, so it lives behind its own lock.

use parking_lot::RwLock;
use std::sync::Arc;

/// Shared slot holding the last-seen sequence number
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last: Arc<RwLock<Option<u64>>>,
}

impl SequenceTracker {
    /// Create an unset tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, `None` until the first dispatch
    pub fn get(&self) -> Option<u64> {
        *self.last.read()
    }

    /// Overwrite the value
    pub fn set(&self, sequence: u64) {
        *self.last.write() = Some(sequence);
    }

    /// Forget the value
    pub fn reset(&self) {
        *self.last.write() = None;
    }
}
