//! Mode stack state machine.
//!
//! Tracks the active mode, a stack of the modes it replaced and, in
//! parallel, how many frames above each were provisional (`once`). Every
//! operation is one logical mode change: exit/enter actions and the
//! notification fire at most once per operation, however many frames it
//! unwinds.

use std::sync::Arc;

use tracing::{info, warn};

use crate::tapmap::{Mode, ModeAction, ModeSwitch, ResolvedMap};

/// Mode-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSwitchEvent {
    /// Name of the now-active mode
    pub mode: String,
    /// Provisional frames on top of the stack
    pub once_level: usize,
}

/// Side effect produced by a transition, in firing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEffect {
    /// Exit action of the mode left or enter action of the mode entered
    Action(ModeAction),
    Switched(ModeSwitchEvent),
}

#[derive(Debug)]
pub struct ModeStack {
    map: Arc<ResolvedMap>,
    current: usize,
    stack: Vec<usize>,
    once_stack: Vec<usize>,
    once_level: usize,
    effects: Vec<StackEffect>,
}

impl ModeStack {
    /// Stack over `map`, starting in the default mode
    pub fn new(map: Arc<ResolvedMap>) -> Self {
        Self {
            map,
            current: 0,
            stack: Vec::new(),
            once_stack: Vec::new(),
            once_level: 0,
            effects: Vec::new(),
        }
    }

    pub fn map(&self) -> &Arc<ResolvedMap> {
        &self.map
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_mode(&self) -> &Mode {
        // index 0 always exists; `current` is only ever set to a valid index
        self.map
            .mode(self.current)
            .unwrap_or_else(|| self.map.default_mode())
    }

    pub fn once_level(&self) -> usize {
        self.once_level
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Announce the current mode, whether or not anything changed
    pub fn start(&mut self) {
        self.effects.push(StackEffect::Switched(self.event()));
    }

    /// Effects queued since the last call
    pub fn take_effects(&mut self) -> Vec<StackEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn apply(&mut self, switch: &ModeSwitch) {
        match *switch {
            ModeSwitch::Reset => self.reset(),
            ModeSwitch::Push(target) => self.push(target),
            ModeSwitch::Pop => self.pop(),
            ModeSwitch::Once(target) => self.once(target),
        }
    }

    /// Clear the stack and return to the default mode
    pub fn reset(&mut self) {
        self.transition(|s| {
            s.stack.clear();
            s.once_stack.clear();
            s.once_level = 0;
            s.current = 0;
        });
    }

    pub fn push(&mut self, target: usize) {
        if !self.valid(target) {
            return;
        }
        self.transition(|s| {
            s.stack.push(s.current);
            s.once_stack.push(s.once_level);
            s.once_level = 0;
            s.current = target;
        });
    }

    /// Provisional push, reverted by [`maybe_pop_once`](Self::maybe_pop_once)
    pub fn once(&mut self, target: usize) {
        if !self.valid(target) {
            return;
        }
        self.transition(|s| {
            s.stack.push(s.current);
            s.once_stack.push(s.once_level);
            s.once_level += 1;
            s.current = target;
        });
    }

    /// Pop back past transient frames, stopping at the first mode that is
    /// inside a once-run or kept in the stack. No-op on an empty stack.
    pub fn pop(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        self.transition(|s| {
            while s.pop_frame() {
                let keep = s.map.mode(s.current).is_some_and(|m| m.keep_in_stack);
                if s.once_level != 0 || keep {
                    break;
                }
            }
        });
    }

    /// Revert every open once-frame. Called after a committed key action.
    pub fn maybe_pop_once(&mut self) {
        if self.once_level == 0 {
            return;
        }
        self.transition(|s| {
            while s.once_level > 0 && s.pop_frame() {}
        });
    }

    fn pop_frame(&mut self) -> bool {
        let (Some(mode), Some(level)) = (self.stack.pop(), self.once_stack.pop()) else {
            return false;
        };
        self.current = mode;
        self.once_level = level;
        true
    }

    fn valid(&self, target: usize) -> bool {
        debug_assert!(target < self.map.len(), "mode index {target} out of range");
        if target >= self.map.len() {
            warn!("ignoring switch to out-of-range mode {target}");
            return false;
        }
        true
    }

    fn event(&self) -> ModeSwitchEvent {
        ModeSwitchEvent {
            mode: self.current_mode().name.clone(),
            once_level: self.once_level,
        }
    }

    fn transition(&mut self, change: impl FnOnce(&mut Self)) {
        let before = (self.current, self.once_level);
        let map = Arc::clone(&self.map);
        let old_mode = self.current_mode().name.clone();
        let exit = self.current_mode().exit.clone();

        change(self);

        debug_assert_eq!(self.stack.len(), self.once_stack.len());
        debug_assert!(self.once_level <= self.stack.len());

        if self.current != before.0 {
            self.effects.extend(exit.into_iter().map(StackEffect::Action));
            if let Some(mode) = map.mode(self.current) {
                let enter = mode.enter.iter().cloned().map(StackEffect::Action);
                self.effects.extend(enter);
            }
        }
        if (self.current, self.once_level) != before {
            let event = self.event();
            info!(
                "mode {old_mode} -> {} (once level {}, depth {})",
                event.mode,
                event.once_level,
                self.stack.len()
            );
            self.effects.push(StackEffect::Switched(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"
base:
  :default: true
kept:
  :enter: { action: vibrate, vibrate: [10] }
  :exit: { action: notify, message: left kept, duration: 100 }
t1:
  :in-stack: false
t2:
  :in-stack: false
"#;

    fn stack() -> ModeStack {
        ModeStack::new(Arc::new(MAP.parse().unwrap()))
    }

    fn idx(s: &ModeStack, name: &str) -> usize {
        s.map().index_of(name).unwrap()
    }

    fn switched(effects: &[StackEffect]) -> Vec<(String, usize)> {
        effects
            .iter()
            .filter_map(|e| match e {
                StackEffect::Switched(ev) => Some((ev.mode.clone(), ev.once_level)),
                StackEffect::Action(_) => None,
            })
            .collect()
    }

    #[test]
    fn start_notifies_unconditionally() {
        let mut s = stack();
        s.start();
        assert_eq!(switched(&s.take_effects()), vec![("base".to_string(), 0)]);
    }

    #[test]
    fn empty_pop_is_noop() {
        let mut s = stack();
        s.pop();
        assert_eq!(s.current(), 0);
        assert!(s.take_effects().is_empty());
    }

    #[test]
    fn once_run_reverts_after_commit() {
        let mut s = stack();
        let kept = idx(&s, "kept");
        let t1 = idx(&s, "t1");
        let t2 = idx(&s, "t2");
        s.push(kept);
        s.once(t1);
        s.once(t2);
        assert_eq!(s.once_level(), 2);
        assert_eq!(s.depth(), 3);
        s.take_effects();

        s.maybe_pop_once();
        assert_eq!(s.current(), kept);
        assert_eq!(s.once_level(), 0);
        assert_eq!(s.depth(), 1);
        // One logical change, one notification
        assert_eq!(switched(&s.take_effects()), vec![("kept".to_string(), 0)]);

        s.maybe_pop_once();
        assert!(s.take_effects().is_empty());
    }

    #[test]
    fn pop_skips_transient_frames() {
        let mut s = stack();
        let kept = idx(&s, "kept");
        let t1 = idx(&s, "t1");
        let t2 = idx(&s, "t2");
        s.push(kept);
        s.push(t1);
        s.push(t2);
        s.take_effects();

        // t2 -> t1 (transient, keep going) -> kept (stop)
        s.pop();
        assert_eq!(s.current(), kept);
        assert_eq!(s.depth(), 1);
        assert_eq!(switched(&s.take_effects()), vec![("kept".to_string(), 0)]);
    }

    #[test]
    fn pop_stops_inside_once_run() {
        let mut s = stack();
        let t1 = idx(&s, "t1");
        let t2 = idx(&s, "t2");
        s.once(t1);
        s.push(t2);
        s.pop();
        assert_eq!(s.current(), t1);
        assert_eq!(s.once_level(), 1);
    }

    #[test]
    fn pop_to_bottom_of_transient_stack() {
        let mut s = stack();
        let t1 = idx(&s, "t1");
        let t2 = idx(&s, "t2");
        s.push(t1);
        s.push(t2);
        s.pop();
        // base is kept in stack, so the unwind stops there
        assert_eq!(s.current(), 0);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn exit_before_enter_before_notification() {
        let mut s = stack();
        let kept = idx(&s, "kept");
        s.push(kept);
        let effects = s.take_effects();
        assert_eq!(
            effects,
            vec![
                StackEffect::Action(ModeAction::Vibrate(vec![10])),
                StackEffect::Switched(ModeSwitchEvent {
                    mode: "kept".to_string(),
                    once_level: 0
                }),
            ]
        );

        s.reset();
        let effects = s.take_effects();
        assert_eq!(
            effects[0],
            StackEffect::Action(ModeAction::Notify {
                message: "left kept".to_string(),
                duration_ms: 100
            })
        );
        assert_eq!(switched(&effects), vec![("base".to_string(), 0)]);
    }

    #[test]
    fn reset_in_default_is_silent() {
        let mut s = stack();
        s.reset();
        assert!(s.take_effects().is_empty());
    }

    #[test]
    fn same_mode_once_notifies_level_change() {
        let mut s = stack();
        s.once(0);
        let effects = s.take_effects();
        // No exit/enter: the active index did not change
        assert_eq!(
            effects,
            vec![StackEffect::Switched(ModeSwitchEvent {
                mode: "base".to_string(),
                once_level: 1
            })]
        );
    }

    #[test]
    fn stacks_stay_balanced() {
        let mut s = stack();
        let n = s.map().len();
        // Deterministic pseudo-random walk over push/once/pop/commit
        let mut seed: u32 = 0x2545_F491;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let target = (seed >> 8) as usize % n;
            match (seed >> 20) % 5 {
                0 => s.push(target),
                1 => s.once(target),
                2 | 3 => s.pop(),
                _ => s.maybe_pop_once(),
            }
            assert_eq!(s.stack.len(), s.once_stack.len());
            assert!(s.once_level() <= s.depth());
            s.take_effects();
        }
    }
}
