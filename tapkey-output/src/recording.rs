//! In-memory backend for tests and tooling

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::OutputError;
use crate::types::KeyEvent;
use crate::KeySink;

/// Records every accepted event into a shared buffer.
///
/// Clones share the buffer, so a test can hand one clone to the engine and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<KeyEvent>>>,
    batches: Arc<Mutex<usize>>,
    accept_limit: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `limit` events per batch (simulates a blocked injector)
    pub fn with_accept_limit(limit: usize) -> Self {
        Self {
            accept_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Snapshot of everything accepted so far
    pub fn events(&self) -> Vec<KeyEvent> {
        self.events.lock().clone()
    }

    /// Drain the buffer
    pub fn take(&self) -> Vec<KeyEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of non-empty batches received
    pub fn batch_count(&self) -> usize {
        *self.batches.lock()
    }
}

impl KeySink for RecordingSink {
    fn send_batch(&mut self, events: &[KeyEvent]) -> Result<usize, OutputError> {
        let accepted = self
            .accept_limit
            .map_or(events.len(), |limit| limit.min(events.len()));
        self.events.lock().extend_from_slice(&events[..accepted]);
        *self.batches.lock() += 1;
        Ok(accepted)
    }

    fn name(&self) -> &str {
        "recording"
    }
}
