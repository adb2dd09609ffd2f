//! Abstract keyboard actions bound to hotkey slots.
//!
//! A [`KeyAction`] says what should be typed, not how: the
//! [`Keyboard`](crate::keyboard::Keyboard) composer expands it into physical
//! press/release events against the current modifier state.

use std::fmt;
use std::sync::Arc;

use crate::keys::{key_name, ModifierNames};

/// One keyboard primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Raw virtual key.
    ///
    /// `modifiers` overrides the composing set when present; `add_modifiers`
    /// is OR'd on top either way.
    Key {
        vk: u16,
        down: bool,
        up: bool,
        modifiers: Option<u8>,
        add_modifiers: u8,
    },
    /// Literal character; typed through its US-layout key, injected as
    /// unicode when no key produces it.
    Char {
        ch: char,
        down: bool,
        up: bool,
        modifiers: Option<u8>,
        add_modifiers: u8,
    },
    /// Add to the composing set, and to the sticky set unless
    /// `reset_on_next_compose`.
    AddModifiers {
        modifiers: u8,
        reset_on_next_compose: bool,
    },
    /// Flip modifiers in the composing and sticky sets; with `send_keys`,
    /// bring the physically held set in line.
    ToggleModifiers { modifiers: u8, send_keys: bool },
    /// Sub-actions scheduled at offsets from the moment the sequence runs.
    Sequence(Vec<SequenceStep>),
}

/// One timed step of a [`KeyAction::Sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStep {
    /// Offset from the start of the sequence
    pub delay_ms: u32,
    pub action: Arc<KeyAction>,
}

impl KeyAction {
    /// Full press and release of `vk` with extra modifiers.
    pub fn key(vk: u16, add_modifiers: u8) -> Self {
        KeyAction::Key {
            vk,
            down: true,
            up: true,
            modifiers: None,
            add_modifiers,
        }
    }

    /// Full press and release of a character.
    pub fn char(ch: char) -> Self {
        KeyAction::Char {
            ch,
            down: true,
            up: true,
            modifiers: None,
            add_modifiers: 0,
        }
    }

    /// One [`KeyAction::Char`] per character of `text`.
    pub fn text(text: &str) -> Vec<Arc<KeyAction>> {
        text.chars().map(|c| Arc::new(KeyAction::char(c))).collect()
    }

    pub fn add_modifiers(modifiers: u8, reset_on_next_compose: bool) -> Self {
        KeyAction::AddModifiers {
            modifiers,
            reset_on_next_compose,
        }
    }

    pub fn toggle_modifiers(modifiers: u8, send_keys: bool) -> Self {
        KeyAction::ToggleModifiers {
            modifiers,
            send_keys,
        }
    }

    /// Whether this is a sequence (scheduled rather than composed directly)
    pub fn is_sequence(&self) -> bool {
        matches!(self, KeyAction::Sequence(_))
    }
}

fn write_direction(f: &mut fmt::Formatter<'_>, down: bool, up: bool) -> fmt::Result {
    match (down, up) {
        (true, false) => write!(f, " down"),
        (false, true) => write!(f, " up"),
        (false, false) => write!(f, " (none)"),
        (true, true) => Ok(()),
    }
}

fn write_modifiers(f: &mut fmt::Formatter<'_>, modifiers: Option<u8>, add: u8) -> fmt::Result {
    if let Some(m) = modifiers {
        write!(f, "[{}]", ModifierNames(m))?;
    }
    if add != 0 {
        write!(f, "{}+", ModifierNames(add))?;
    }
    Ok(())
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Key {
                vk,
                down,
                up,
                modifiers,
                add_modifiers,
            } => {
                write_modifiers(f, *modifiers, *add_modifiers)?;
                write!(f, "{}", key_name(*vk))?;
                write_direction(f, *down, *up)
            }
            KeyAction::Char {
                ch,
                down,
                up,
                modifiers,
                add_modifiers,
            } => {
                write_modifiers(f, *modifiers, *add_modifiers)?;
                write!(f, "{ch:?}")?;
                write_direction(f, *down, *up)
            }
            KeyAction::AddModifiers {
                modifiers,
                reset_on_next_compose,
            } => {
                write!(f, "modifier({})", ModifierNames(*modifiers))?;
                if !reset_on_next_compose {
                    write!(f, " sticky")?;
                }
                Ok(())
            }
            KeyAction::ToggleModifiers {
                modifiers,
                send_keys,
            } => {
                write!(f, "toggle({})", ModifierNames(*modifiers))?;
                if *send_keys {
                    write!(f, " send")?;
                }
                Ok(())
            }
            KeyAction::Sequence(steps) => {
                write!(f, "sequence[")?;
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}@{}ms", step.action, step.delay_ms)?;
                }
                write!(f, "]")
            }
        }
    }
}
