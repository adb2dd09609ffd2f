//! Output scheduler: time-keyed action queue drained into a key sink.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tapkey_output::KeySink;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::key_action::KeyAction;
use crate::keyboard::{ComposeState, Keyboard};

type Buckets = BTreeMap<Instant, Vec<Arc<KeyAction>>>;

/// Actions keyed by due time. Actions due at the same instant share a
/// bucket and run in insertion order.
///
/// Clones share the queue, so producers can enqueue while the drain loop
/// holds the scheduler.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    buckets: Arc<RwLock<Buckets>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action to the bucket due at `due`
    pub fn push_at(&self, due: Instant, action: Arc<KeyAction>) {
        self.buckets.write().entry(due).or_default().push(action);
    }

    /// Schedule an action as of `now`.
    ///
    /// Sequences are decomposed into their steps, each placed at `now` plus
    /// its offset. Nested sequences accumulate offsets.
    pub fn register(&self, action: &Arc<KeyAction>, now: Instant) {
        match action.as_ref() {
            KeyAction::Sequence(steps) => {
                for step in steps {
                    let due = now + Duration::from_millis(u64::from(step.delay_ms));
                    self.register(&step.action, due);
                }
            }
            _ => self.push_at(now, Arc::clone(action)),
        }
    }

    /// Earliest due time, if anything is queued
    pub fn first_due(&self) -> Option<Instant> {
        self.buckets.read().keys().next().copied()
    }

    /// Remove and return the earliest bucket if it is due at or before `now`
    pub fn pop_due(&self, now: Instant) -> Option<Vec<Arc<KeyAction>>> {
        // Peek under the read lock so producers are only excluded when
        // there is something to remove.
        if self.first_due()? > now {
            return None;
        }
        let mut buckets = self.buckets.write();
        let entry = buckets.first_entry()?;
        if *entry.key() > now {
            return None;
        }
        Some(entry.remove())
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    pub fn clear(&self) {
        self.buckets.write().clear();
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Time until the next queued bucket is due
    pub next_due: Option<Duration>,
    /// Set when the composing state differs from the last one reported
    pub compose: Option<ComposeState>,
    /// Events the sink accepted this pass
    pub sent: usize,
}

/// Owns the composer and the sink; drains the queue on each tick.
pub struct OutputScheduler {
    queue: EventQueue,
    keyboard: Keyboard,
    sink: Box<dyn KeySink>,
    last_notified: ComposeState,
}

impl OutputScheduler {
    pub fn new(sink: Box<dyn KeySink>) -> Self {
        Self {
            queue: EventQueue::new(),
            keyboard: Keyboard::new(),
            sink,
            last_notified: ComposeState::default(),
        }
    }

    /// Shared handle to the queue
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    pub fn register(&self, action: &Arc<KeyAction>, now: Instant) {
        self.queue.register(action, now);
    }

    /// Run every due bucket against the composer, then flush the physical
    /// events as a single batch.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        while let Some(bucket) = self.queue.pop_due(now) {
            trace!("draining {} queued action(s)", bucket.len());
            for action in &bucket {
                self.keyboard.invoke(action);
            }
        }
        let sent = self.flush();

        let state = self.keyboard.compose_state();
        let compose = (state != self.last_notified).then(|| {
            self.last_notified = state;
            state
        });

        TickReport {
            next_due: self
                .queue
                .first_due()
                .map(|due| due.saturating_duration_since(now)),
            compose,
            sent,
        }
    }

    /// Drop queued actions and release anything physically held.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.keyboard.reset();
        self.flush();
    }

    fn flush(&mut self) -> usize {
        let events = self.keyboard.take_output();
        if events.is_empty() {
            return 0;
        }
        match self.sink.send_batch(&events) {
            Ok(accepted) => {
                if accepted != events.len() {
                    warn!(
                        "{}: accepted {accepted} of {} key events",
                        self.sink.name(),
                        events.len()
                    );
                }
                accepted
            }
            Err(e) => {
                warn!("{}: {e}", self.sink.name());
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_action::SequenceStep;
    use crate::keys::mods;
    use tapkey_output::{vk, KeyEvent, RecordingSink};

    fn scheduler() -> (OutputScheduler, RecordingSink) {
        let sink = RecordingSink::new();
        (OutputScheduler::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn same_instant_shares_bucket() {
        let queue = EventQueue::new();
        let now = Instant::now();
        queue.push_at(now, Arc::new(KeyAction::char('a')));
        queue.push_at(now, Arc::new(KeyAction::char('b')));
        assert_eq!(queue.len(), 2);
        let bucket = queue.pop_due(now).unwrap();
        assert_eq!(*bucket[0], KeyAction::char('a'));
        assert_eq!(*bucket[1], KeyAction::char('b'));
        assert!(queue.is_empty());
    }

    #[test]
    fn future_bucket_stays() {
        let queue = EventQueue::new();
        let now = Instant::now();
        queue.push_at(now + Duration::from_millis(5), Arc::new(KeyAction::char('a')));
        assert!(queue.pop_due(now).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(now + Duration::from_millis(5)).is_some());
    }

    #[test]
    fn nested_sequences_accumulate_offsets() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let inner = KeyAction::Sequence(vec![SequenceStep {
            delay_ms: 30,
            action: Arc::new(KeyAction::char('b')),
        }]);
        let outer = Arc::new(KeyAction::Sequence(vec![
            SequenceStep {
                delay_ms: 0,
                action: Arc::new(KeyAction::char('a')),
            },
            SequenceStep {
                delay_ms: 100,
                action: Arc::new(inner),
            },
        ]));
        queue.register(&outer, now);
        assert_eq!(queue.first_due(), Some(now));
        queue.pop_due(now).unwrap();
        assert_eq!(queue.first_due(), Some(now + Duration::from_millis(130)));
    }

    #[test]
    fn tick_flushes_one_batch() {
        let (mut sched, sink) = scheduler();
        let now = Instant::now();
        sched.register(&Arc::new(KeyAction::key(vk::KEY_A, 0)), now);
        sched.register(&Arc::new(KeyAction::key(vk::KEY_A + 1, 0)), now);
        sched.register(
            &Arc::new(KeyAction::key(vk::KEY_A + 2, 0)),
            now + Duration::from_millis(40),
        );

        let report = sched.tick(now);
        assert_eq!(report.sent, 4);
        assert_eq!(report.next_due, Some(Duration::from_millis(40)));
        assert_eq!(sink.batch_count(), 1);

        let report = sched.tick(now + Duration::from_millis(50));
        assert_eq!(report.sent, 2);
        assert_eq!(report.next_due, None);
        assert_eq!(sink.events().len(), 6);
    }

    #[test]
    fn empty_tick_sends_nothing() {
        let (mut sched, sink) = scheduler();
        let report = sched.tick(Instant::now());
        assert_eq!(report, TickReport::default());
        assert_eq!(sink.batch_count(), 0);
    }

    #[test]
    fn compose_state_reported_on_change() {
        let (mut sched, _sink) = scheduler();
        let now = Instant::now();
        sched.register(&Arc::new(KeyAction::add_modifiers(mods::LCTRL, true)), now);
        let report = sched.tick(now);
        assert_eq!(
            report.compose,
            Some(ComposeState {
                modifiers: mods::LCTRL,
                composing: true
            })
        );
        assert_eq!(sched.tick(now).compose, None);

        sched.register(&Arc::new(KeyAction::char('c')), now);
        assert_eq!(sched.tick(now).compose, Some(ComposeState::default()));
    }

    #[test]
    fn partial_accept_is_not_retried() {
        let sink = RecordingSink::with_accept_limit(1);
        let mut sched = OutputScheduler::new(Box::new(sink.clone()));
        let now = Instant::now();
        sched.register(&Arc::new(KeyAction::key(vk::RETURN, 0)), now);
        assert_eq!(sched.tick(now).sent, 1);
        assert_eq!(sched.tick(now).sent, 0);
        assert_eq!(sink.events(), vec![KeyEvent::key(vk::RETURN, false)]);
    }

    #[test]
    fn reset_clears_queue() {
        let (mut sched, _sink) = scheduler();
        let now = Instant::now();
        sched.register(&Arc::new(KeyAction::char('a')), now);
        sched.reset();
        assert!(sched.queue().is_empty());
    }
}
