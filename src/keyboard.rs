//! Keyboard composer: modifier bookkeeping and action expansion.
//!
//! Three modifier sets are tracked:
//!
//! - `held`: what has physically been sent down and not released
//! - `sticky`: logical modifiers that persist across actions
//! - `composing`: scoped to the action being composed; reads as `sticky`
//!   while unset and is cleared when a character completes
//!
//! Invoking an action appends physical events to an output buffer which the
//! [`OutputScheduler`](crate::scheduler::OutputScheduler) flushes in batches.

use tapkey_output::KeyEvent;

use crate::key_action::KeyAction;
use crate::keys::{char_to_vk, modifier_bits, modifier_vk};

/// Composing-state notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComposeState {
    /// Active composing modifier set
    pub modifiers: u8,
    /// Whether a composition is in progress
    pub composing: bool,
}

/// Modifier state plus pending physical output.
#[derive(Debug, Default)]
pub struct Keyboard {
    held: u8,
    sticky: u8,
    composing: Option<u8>,
    output: Vec<KeyEvent>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> u8 {
        self.held
    }

    pub fn sticky(&self) -> u8 {
        self.sticky
    }

    /// Composing set, defaulting to the sticky set
    pub fn composing_modifiers(&self) -> u8 {
        self.composing.unwrap_or(self.sticky)
    }

    pub fn compose_state(&self) -> ComposeState {
        ComposeState {
            modifiers: self.composing_modifiers(),
            composing: self.composing.is_some(),
        }
    }

    /// Drain the physical event buffer
    pub fn take_output(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.output)
    }

    /// Forget all modifier state and buffered output.
    ///
    /// Physically held modifiers are released first so nothing stays stuck
    /// down on the host.
    pub fn reset(&mut self) {
        self.output.clear();
        for bit in modifier_bits(self.held).rev() {
            if let Some(code) = modifier_vk(bit) {
                self.output.push(KeyEvent::key(code, true));
            }
        }
        self.held = 0;
        self.sticky = 0;
        self.composing = None;
    }

    /// Expand one action into physical events.
    ///
    /// Sequences produce no events here; the scheduler decomposes them into
    /// their timed steps before they reach the composer.
    pub fn invoke(&mut self, action: &KeyAction) {
        match *action {
            KeyAction::Key {
                vk,
                down,
                up,
                modifiers,
                add_modifiers,
            } => {
                let effective = modifiers.unwrap_or(self.composing_modifiers()) | add_modifiers;
                self.bracket(effective, KeyEvent::key(vk, false), down, up);
            }
            KeyAction::Char {
                ch,
                down,
                up,
                modifiers,
                add_modifiers,
            } => {
                let effective = modifiers.unwrap_or(self.composing_modifiers()) | add_modifiers;
                match char_to_vk(ch) {
                    Some((code, shift)) => {
                        self.bracket(effective | shift, KeyEvent::key(code, false), down, up)
                    }
                    None => self.bracket(effective, KeyEvent::unicode(ch, false), down, up),
                }
                self.composing = None;
            }
            KeyAction::AddModifiers {
                modifiers,
                reset_on_next_compose,
            } => {
                self.composing = Some(self.composing_modifiers() | modifiers);
                if !reset_on_next_compose {
                    self.sticky |= modifiers;
                }
            }
            KeyAction::ToggleModifiers {
                modifiers,
                send_keys,
            } => {
                self.composing = Some(self.composing_modifiers() ^ modifiers);
                self.sticky ^= modifiers;
                if send_keys {
                    let released = self.held & !self.sticky;
                    let pressed = !self.held & self.sticky;
                    self.push_modifiers(released, true);
                    self.push_modifiers(pressed, false);
                    self.held = self.sticky;
                }
            }
            KeyAction::Sequence(_) => {}
        }
    }

    /// Modifiers not already held go down before the primary event and come
    /// back up after it, in reverse order.
    fn bracket(&mut self, effective: u8, primary: KeyEvent, down: bool, up: bool) {
        let needed = effective & !self.held;
        if down {
            self.push_modifiers(needed, false);
            self.output.push(primary);
        }
        if up {
            self.output.push(KeyEvent { up: true, ..primary });
            for bit in modifier_bits(needed).rev() {
                if let Some(code) = modifier_vk(bit) {
                    self.output.push(KeyEvent::key(code, true));
                }
            }
        }
    }

    fn push_modifiers(&mut self, mask: u8, up: bool) {
        for bit in modifier_bits(mask) {
            if let Some(code) = modifier_vk(bit) {
                self.output.push(KeyEvent::key(code, up));
            }
        }
    }
}
