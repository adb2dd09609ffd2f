//! Tap processing engine.
//!
//! Wires the pipeline together: device taps go through the multitap
//! composer, committed observations are looked up in the active mode, key
//! actions are queued on the output scheduler and mode switches drive the
//! mode stack. Everything runs on the task that owns the [`Engine`]; only
//! the debounce timers are spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tapkey_output::KeySink;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::{DeviceEvent, TapDevice};
use crate::keyboard::ComposeState;
use crate::mode_stack::{ModeStack, ModeSwitchEvent, StackEffect};
use crate::multitap::{MultitapComposer, MultitapEvent};
use crate::scheduler::OutputScheduler;
use crate::tapmap::{HotkeyEntry, ModeAction, ResolvedMap};

/// Broadcast buffer per notification kind
const CHANNEL_SIZE: usize = 64;

/// Highest valid tap mask (five fingers)
const MAX_MASK: u8 = 0b11111;

/// Engine timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Multitap window
    pub multitap_timeout: Duration,
    /// Output drain period
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            multitap_timeout: MultitapComposer::DEFAULT_TIMEOUT,
            tick_interval: Duration::from_millis(10),
        }
    }
}

/// Live tap feedback for a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapFeedback {
    pub mask: u8,
    pub count: u32,
    /// `false` while more repeats may follow
    pub committed: bool,
}

/// Message from a mode's enter or exit `notify` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub duration_ms: u32,
}

pub struct Engine {
    composer: MultitapComposer,
    multitap_rx: mpsc::UnboundedReceiver<MultitapEvent>,
    stack: ModeStack,
    scheduler: OutputScheduler,
    device: Box<dyn TapDevice>,
    tick_interval: Duration,
    modes: broadcast::Sender<ModeSwitchEvent>,
    compose: broadcast::Sender<ComposeState>,
    taps: broadcast::Sender<TapFeedback>,
    notices: broadcast::Sender<Notice>,
}

impl Engine {
    pub fn new(
        map: Arc<ResolvedMap>,
        sink: Box<dyn KeySink>,
        device: Box<dyn TapDevice>,
        config: EngineConfig,
    ) -> Self {
        let (composer, multitap_rx) = MultitapComposer::new(config.multitap_timeout);
        Self {
            composer,
            multitap_rx,
            stack: ModeStack::new(map),
            scheduler: OutputScheduler::new(sink),
            device,
            tick_interval: config.tick_interval,
            modes: broadcast::channel(CHANNEL_SIZE).0,
            compose: broadcast::channel(CHANNEL_SIZE).0,
            taps: broadcast::channel(CHANNEL_SIZE).0,
            notices: broadcast::channel(CHANNEL_SIZE).0,
        }
    }

    pub fn subscribe_modes(&self) -> broadcast::Receiver<ModeSwitchEvent> {
        self.modes.subscribe()
    }

    pub fn subscribe_compose(&self) -> broadcast::Receiver<ComposeState> {
        self.compose.subscribe()
    }

    pub fn subscribe_taps(&self) -> broadcast::Receiver<TapFeedback> {
        self.taps.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn map(&self) -> &Arc<ResolvedMap> {
        self.stack.map()
    }

    pub fn mode_stack(&self) -> &ModeStack {
        &self.stack
    }

    pub fn scheduler(&self) -> &OutputScheduler {
        &self.scheduler
    }

    /// Name of the active mode
    pub fn current_mode(&self) -> &str {
        &self.stack.current_mode().name
    }

    /// Announce the initial mode
    pub fn start(&mut self) {
        self.stack.start();
        self.apply_effects();
    }

    /// Install a freshly resolved map, dropping all runtime state.
    pub fn set_map(&mut self, map: Arc<ResolvedMap>) {
        info!("installing map with {} mode(s)", map.len());
        self.composer.reset();
        self.scheduler.reset();
        self.stack = ModeStack::new(map);
        self.start();
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent, now: Instant) {
        match event {
            DeviceEvent::Tap { mask } => self.handle_tap(mask, now),
            DeviceEvent::Connected {
                device_id,
                name,
                firmware,
            } => {
                info!("device {name} ({device_id}) connected, firmware {firmware}");
                self.reset_runtime();
            }
            DeviceEvent::Disconnected { device_id } => {
                info!("device {device_id} disconnected");
                self.reset_runtime();
            }
        }
    }

    fn handle_tap(&mut self, mask: u8, now: Instant) {
        if mask == 0 || mask > MAX_MASK {
            debug!("ignoring tap mask {mask:#04x}");
            return;
        }
        // A commit of the previous mask may switch modes; it has to land
        // before the new tap is looked up
        self.composer.flush_stale(mask, now);
        self.poll(now);

        let mode = self.stack.current_mode();
        self.composer.on_tap(mask, now, |mask, count| {
            mode.slot(mask)
                .is_some_and(|entry| entry.should_stay_pending(count))
        });
        self.poll(now);
    }

    /// Process queued multitap notifications, then drain the output queue.
    pub fn poll(&mut self, now: Instant) -> Option<Duration> {
        while let Ok(event) = self.multitap_rx.try_recv() {
            self.handle_multitap(event, now);
        }
        self.tick(now)
    }

    pub fn handle_multitap(&mut self, event: MultitapEvent, now: Instant) {
        let (mask, count, committed) = match event {
            MultitapEvent::Pending { mask, count } => (mask, count, false),
            MultitapEvent::Commit { mask, count } => (mask, count, true),
        };
        let _ = self.taps.send(TapFeedback {
            mask,
            count,
            committed,
        });
        if committed {
            self.commit(mask, count, now);
        } else {
            debug!("pending {mask:#04x} x{}", count + 1);
        }
    }

    fn commit(&mut self, mask: u8, count: u32, now: Instant) {
        let map = Arc::clone(self.stack.map());
        let Some(mode) = map.mode(self.stack.current()) else {
            return;
        };
        let Some(entry) = mode.slot(mask) else {
            return;
        };
        debug!("commit {mask:#04x} x{} in {}: {entry}", count + 1, mode.name);

        match entry.select(count) {
            HotkeyEntry::Empty => {}
            HotkeyEntry::KeySequence(actions) => {
                for action in actions {
                    self.scheduler.register(action, now);
                }
                self.stack.maybe_pop_once();
            }
            HotkeyEntry::ModeSwitch(switch) => self.stack.apply(switch),
            HotkeyEntry::MultiTap(_) => {
                warn!("nested multi-tap entry in {} ignored", mode.name);
            }
        }
        self.apply_effects();
        self.tick(now);
    }

    /// Drain due output; returns the wait until the next queued bucket.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        let report = self.scheduler.tick(now);
        if let Some(state) = report.compose {
            let _ = self.compose.send(state);
        }
        report.next_due
    }

    fn reset_runtime(&mut self) {
        self.composer.reset();
        while self.multitap_rx.try_recv().is_ok() {}
        self.scheduler.reset();
        self.stack.reset();
        self.apply_effects();
        let report = self.scheduler.tick(Instant::now());
        if let Some(state) = report.compose {
            let _ = self.compose.send(state);
        }
    }

    fn apply_effects(&mut self) {
        for effect in self.stack.take_effects() {
            match effect {
                StackEffect::Action(ModeAction::Vibrate(pattern)) => self.device.vibrate(&pattern),
                StackEffect::Action(ModeAction::Notify {
                    message,
                    duration_ms,
                }) => {
                    info!("notice: {message}");
                    let _ = self.notices.send(Notice {
                        message,
                        duration_ms,
                    });
                }
                StackEffect::Switched(event) => {
                    let _ = self.modes.send(event);
                }
            }
        }
    }

    /// Drive the engine until the device channel closes or `running` is
    /// cleared.
    ///
    /// On channel close, open multitap windows are committed and delayed
    /// output is played out before returning. Either way held modifiers are
    /// released.
    pub async fn run(&mut self, mut device_rx: mpsc::Receiver<DeviceEvent>, running: Arc<AtomicBool>) {
        self.start();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut closed = false;
        while running.load(Ordering::SeqCst) {
            tokio::select! {
                event = device_rx.recv() => match event {
                    Some(event) => self.handle_device_event(event, Instant::now()),
                    None => {
                        closed = true;
                        break;
                    }
                },
                Some(event) = self.multitap_rx.recv() => {
                    self.handle_multitap(event, Instant::now());
                }
                _ = interval.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        if closed {
            self.composer.flush();
            let mut next = self.poll(Instant::now());
            while let Some(wait) = next {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(wait).await;
                next = self.poll(Instant::now());
            }
        }
        self.scheduler.reset();
        self.tick(Instant::now());
        info!("engine stopped in mode {}", self.current_mode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tapkey_output::{vk, KeyEvent, RecordingSink};

    #[derive(Clone, Default)]
    struct TestDevice(Arc<Mutex<Vec<Vec<u32>>>>);

    impl TapDevice for TestDevice {
        fn vibrate(&mut self, pattern: &[u32]) {
            self.0.lock().push(pattern.to_vec());
        }
    }

    const MAP: &str = r#"
base:
  :default: true
  "----.": a
  "---.-": [b, c]
  "---..": { mode: { type: once, to: nav } }
  "--.--": { modifier: shift }
nav:
  :enter: { action: vibrate, vibrate: [20, 10, 20] }
  "----.": Left
"#;

    fn engine() -> (Engine, RecordingSink, TestDevice) {
        let sink = RecordingSink::new();
        let device = TestDevice::default();
        let engine = Engine::new(
            Arc::new(MAP.parse().unwrap()),
            Box::new(sink.clone()),
            Box::new(device.clone()),
            EngineConfig::default(),
        );
        (engine, sink, device)
    }

    fn tap(engine: &mut Engine, mask: u8) {
        engine.handle_device_event(DeviceEvent::Tap { mask }, Instant::now());
    }

    fn press(ch: char) -> Vec<KeyEvent> {
        let code = vk::letter(ch).unwrap();
        vec![KeyEvent::key(code, false), KeyEvent::key(code, true)]
    }

    async fn settle(engine: &mut Engine) {
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.poll(Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn single_tap_types_text() {
        let (mut engine, sink, _) = engine();
        tap(&mut engine, 0b00001);
        assert_eq!(sink.take(), press('a'));
    }

    #[tokio::test(start_paused = true)]
    async fn double_tap_picks_second_variant() {
        let (mut engine, sink, _) = engine();
        tap(&mut engine, 0b00010);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tap(&mut engine, 0b00010);
        // Second variant is the last one, so it commits without waiting
        assert_eq!(sink.take(), press('c'));
        settle(&mut engine).await;
        assert!(sink.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn once_mode_reverts_and_vibrates() {
        let (mut engine, sink, device) = engine();
        let mut modes = engine.subscribe_modes();
        tap(&mut engine, 0b00011);
        assert_eq!(engine.current_mode(), "nav");
        assert_eq!(device.0.lock().as_slice(), &[vec![20, 10, 20]]);

        tap(&mut engine, 0b00001);
        assert_eq!(engine.current_mode(), "base");
        assert_eq!(
            sink.take(),
            vec![KeyEvent::key(vk::LEFT, false), KeyEvent::key(vk::LEFT, true)]
        );
        assert_eq!(modes.try_recv().unwrap().mode, "nav");
        assert_eq!(modes.try_recv().unwrap().mode, "base");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_tap_commits_before_different_mask() {
        let (mut engine, sink, _) = engine();
        let mut taps = engine.subscribe_taps();
        tap(&mut engine, 0b00010);
        assert!(sink.events().is_empty());
        tap(&mut engine, 0b00001);
        assert_eq!(sink.take(), [press('b'), press('a')].concat());
        let first = taps.try_recv().unwrap();
        assert!(!first.committed);
    }

    #[tokio::test(start_paused = true)]
    async fn compose_state_broadcast_on_change() {
        let (mut engine, _, _) = engine();
        let mut compose = engine.subscribe_compose();
        tap(&mut engine, 0b00100);
        let state = compose.try_recv().unwrap();
        assert!(state.composing);
        tap(&mut engine, 0b00001);
        let state = compose.try_recv().unwrap();
        assert!(!state.composing);
        assert!(compose.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_resets_mode_and_pending() {
        let (mut engine, sink, _) = engine();
        tap(&mut engine, 0b00011);
        assert_eq!(engine.current_mode(), "nav");
        engine.handle_device_event(
            DeviceEvent::Disconnected {
                device_id: "tap-1".to_string(),
            },
            Instant::now(),
        );
        assert_eq!(engine.current_mode(), "base");

        tap(&mut engine, 0b00010);
        engine.handle_device_event(
            DeviceEvent::Connected {
                device_id: "tap-1".to_string(),
                name: "Tap Strap".to_string(),
                firmware: 2,
            },
            Instant::now(),
        );
        settle(&mut engine).await;
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_out_of_range_masks() {
        let (mut engine, sink, _) = engine();
        tap(&mut engine, 0);
        tap(&mut engine, 0b100000);
        settle(&mut engine).await;
        assert!(sink.events().is_empty());
    }
}
