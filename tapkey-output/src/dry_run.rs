//! Logging-only backend

use tracing::info;

use crate::error::OutputError;
use crate::types::KeyEvent;
use crate::KeySink;

/// Accepts every event and logs it instead of injecting.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl DryRunSink {
    pub fn new() -> Self {
        Self
    }
}

impl KeySink for DryRunSink {
    fn send_batch(&mut self, events: &[KeyEvent]) -> Result<usize, OutputError> {
        let line = events
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        info!("keys: {line}");
        Ok(events.len())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
