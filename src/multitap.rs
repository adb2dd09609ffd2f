//! Multi-tap debounce.
//!
//! Repeated taps of the same mask inside the timeout window are counted
//! into one observation. While the consumer says more repeats could change
//! the meaning, the observation stays pending; it commits when the window
//! elapses, a different mask arrives, or the consumer rules out waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Debounce output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultitapEvent {
    /// More repeats may follow; for live feedback only
    Pending { mask: u8, count: u32 },
    /// Final observation
    Commit { mask: u8, count: u32 },
}

#[derive(Debug, Default)]
struct State {
    last_mask: u8,
    last_tap: Option<Instant>,
    count: u32,
    pending: bool,
    /// Cancel flag of the outstanding delay, replaced on every tap
    cancelled: Arc<AtomicBool>,
}

impl State {
    fn flush(&mut self, events: &mpsc::UnboundedSender<MultitapEvent>) {
        if !self.pending {
            return;
        }
        self.pending = false;
        let _ = events.send(MultitapEvent::Commit {
            mask: self.last_mask,
            count: self.count,
        });
        self.last_mask = 0;
        self.count = 0;
    }

    fn repeats(&self, mask: u8, now: Instant, timeout: Duration) -> bool {
        self.last_mask == mask
            && self
                .last_tap
                .is_some_and(|last| now.saturating_duration_since(last) <= timeout)
    }

    fn cancel_delay(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancelled = Arc::new(AtomicBool::new(false));
    }
}

/// Time-windowed repeat counter over tap masks.
#[derive(Debug)]
pub struct MultitapComposer {
    state: Arc<Mutex<State>>,
    timeout: Duration,
    events: mpsc::UnboundedSender<MultitapEvent>,
}

impl MultitapComposer {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

    /// Create a composer and the receiving end of its notifications.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<MultitapEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let composer = Self {
            state: Arc::new(Mutex::new(State::default())),
            timeout,
            events: tx,
        };
        (composer, rx)
    }

    /// Record a tap at `now`.
    ///
    /// `stay_pending(mask, count)` decides whether the observation may still
    /// change with further repeats. Must be called from within a tokio
    /// runtime; the commit delay runs as a spawned task.
    pub fn on_tap<F>(&self, mask: u8, now: Instant, stay_pending: F)
    where
        F: FnOnce(u8, u32) -> bool,
    {
        let mut state = self.state.lock();
        state.cancel_delay();

        if state.repeats(mask, now, self.timeout) {
            state.count += 1;
        } else {
            state.flush(&self.events);
            state.count = 0;
        }

        state.last_mask = mask;
        state.last_tap = Some(now);
        state.pending = true;
        let count = state.count;

        if !stay_pending(mask, count) {
            state.flush(&self.events);
            return;
        }

        debug!("tap {mask:#04x} pending (count {count})");
        let _ = self.events.send(MultitapEvent::Pending { mask, count });

        let cancelled = Arc::clone(&state.cancelled);
        let shared = Arc::clone(&self.state);
        let events = self.events.clone();
        let deadline = now + self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut state = shared.lock();
            // Checked under the lock: a tap that raced the timer wins
            if !cancelled.load(Ordering::Acquire) {
                state.flush(&events);
            }
        });
    }

    /// Commit any pending observation now. No-op when nothing is pending.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.cancel_delay();
        state.flush(&self.events);
    }

    /// Commit the pending observation if a tap of `mask` at `now` would
    /// start a new run rather than repeat it.
    pub fn flush_stale(&self, mask: u8, now: Instant) {
        let mut state = self.state.lock();
        if state.pending && !state.repeats(mask, now, self.timeout) {
            state.cancel_delay();
            state.flush(&self.events);
        }
    }

    /// Drop pending state without committing.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cancel_delay();
        state.pending = false;
        state.last_mask = 0;
        state.last_tap = None;
        state.count = 0;
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending
    }
}
