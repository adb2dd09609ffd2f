//! Tap map: modes, hotkey tables and their loader.
//!
//! A tap map document names a set of modes. Each mode binds up to 31 tap
//! masks to hotkeys and may extend another mode to inherit its bindings.
//! [`ResolvedMap`] is the validated, index-resolved form used at runtime:
//! the default mode sits at index 0 and every mode switch carries a numeric
//! target.
//!
//! # Document format
//!
//! ```yaml
//! abstract-letters:
//!   ".----": a
//!   "-.---": [b, c]              # single tap b, double tap c
//!
//! base:
//!   :extends: abstract-letters
//!   :default: true
//!   "....." : { mode: { type: once, to: shifted } }
//!   "----.": Enter
//!
//! shifted:
//!   :in-stack: false
//!   :enter: { action: vibrate, vibrate: [100] }
//!   "----.": { modifier: Shift }
//! ```

mod discovery;
mod document;
mod error;
mod resolve;

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::key_action::KeyAction;

pub use discovery::{find_map_file_from, load_map_file, MAP_ENV_VAR, MAP_FILE_NAME};
pub use error::MapError;

/// Hotkey slots per mode, one per 5-bit tap mask (slot 0 is never used)
pub const SLOT_COUNT: usize = 32;

/// Prefix marking a mode as inheritance-only
pub const ABSTRACT_PREFIX: &str = "abstract-";

/// Mode stack transition bound to a hotkey.
///
/// `T` is the target: a mode name while loading, an index once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSwitch<T = usize> {
    Reset,
    Push(T),
    Pop,
    Once(T),
}

impl<T> ModeSwitch<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ModeSwitch::Reset => "reset",
            ModeSwitch::Push(_) => "push",
            ModeSwitch::Pop => "pop",
            ModeSwitch::Once(_) => "once",
        }
    }

    pub fn target(&self) -> Option<&T> {
        match self {
            ModeSwitch::Push(t) | ModeSwitch::Once(t) => Some(t),
            ModeSwitch::Reset | ModeSwitch::Pop => None,
        }
    }

    fn map_target<U, E>(&self, f: &mut impl FnMut(&T) -> Result<U, E>) -> Result<ModeSwitch<U>, E> {
        Ok(match self {
            ModeSwitch::Reset => ModeSwitch::Reset,
            ModeSwitch::Push(t) => ModeSwitch::Push(f(t)?),
            ModeSwitch::Pop => ModeSwitch::Pop,
            ModeSwitch::Once(t) => ModeSwitch::Once(f(t)?),
        })
    }
}

/// What a tap slot does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyEntry<T = usize> {
    Empty,
    /// Actions registered with the output scheduler, in order
    KeySequence(Vec<Arc<KeyAction>>),
    ModeSwitch(ModeSwitch<T>),
    /// Variant chosen by repeat count, `count % len`. Never empty.
    MultiTap(Vec<HotkeyEntry<T>>),
}

impl<T> HotkeyEntry<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, HotkeyEntry::Empty)
    }

    /// Whether a tap observed `count` repeats in could still change meaning.
    ///
    /// A chain of N variants waits until the count reaches N-1; every other
    /// entry commits at once.
    pub fn should_stay_pending(&self, count: u32) -> bool {
        match self {
            HotkeyEntry::MultiTap(variants) => {
                debug_assert!(!variants.is_empty(), "multi-tap entry without variants");
                (count as usize) + 1 < variants.len()
            }
            _ => false,
        }
    }

    /// The entry that runs for a tap observed `count` repeats in.
    pub fn select(&self, count: u32) -> &HotkeyEntry<T> {
        match self {
            HotkeyEntry::MultiTap(variants) if !variants.is_empty() => {
                &variants[count as usize % variants.len()]
            }
            other => other,
        }
    }

    /// Rewrite every mode-switch target, including inside multi-tap chains.
    pub fn map_targets<U, E>(
        &self,
        f: &mut impl FnMut(&T) -> Result<U, E>,
    ) -> Result<HotkeyEntry<U>, E> {
        Ok(match self {
            HotkeyEntry::Empty => HotkeyEntry::Empty,
            HotkeyEntry::KeySequence(actions) => HotkeyEntry::KeySequence(actions.clone()),
            HotkeyEntry::ModeSwitch(switch) => HotkeyEntry::ModeSwitch(switch.map_target(f)?),
            HotkeyEntry::MultiTap(variants) => HotkeyEntry::MultiTap(
                variants
                    .iter()
                    .map(|v| v.map_targets(f))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl<T: fmt::Display> fmt::Display for HotkeyEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyEntry::Empty => write!(f, "Empty"),
            HotkeyEntry::KeySequence(actions) => {
                let text: Option<String> = actions
                    .iter()
                    .map(|a| match **a {
                        KeyAction::Char {
                            ch,
                            down: true,
                            up: true,
                            modifiers: None,
                            add_modifiers: 0,
                        } => Some(ch),
                        _ => None,
                    })
                    .collect();
                match text {
                    Some(text) if !text.is_empty() => write!(f, "Text({text:?})"),
                    _ => {
                        write!(f, "Key(")?;
                        for (i, action) in actions.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{action}")?;
                        }
                        write!(f, ")")
                    }
                }
            }
            HotkeyEntry::ModeSwitch(switch) => match switch.target() {
                Some(target) => write!(f, "ModeSwitch({}, {target})", switch.kind()),
                None => write!(f, "ModeSwitch({})", switch.kind()),
            },
            HotkeyEntry::MultiTap(variants) => {
                write!(f, "MultiTap(")?;
                for (i, variant) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{variant}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Side action fired when a mode is entered or left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeAction {
    /// Vibration pattern (alternating on/off durations in ms)
    Vibrate(Vec<u32>),
    /// Message for the presentation layer
    Notify { message: String, duration_ms: u32 },
}

/// One resolved mode.
#[derive(Debug, Clone)]
pub struct Mode {
    pub name: String,
    pub slots: [HotkeyEntry; SLOT_COUNT],
    pub is_default: bool,
    /// Whether `pop` stops at this mode when unwinding
    pub keep_in_stack: bool,
    pub enter: Vec<ModeAction>,
    pub exit: Vec<ModeAction>,
}

impl Mode {
    /// Hotkey bound to a tap mask; `None` for mask 0 or out of range
    pub fn slot(&self, mask: u8) -> Option<&HotkeyEntry> {
        match mask as usize {
            0 => None,
            i => self.slots.get(i),
        }
    }
}

/// Validated tap map with numeric mode-switch targets.
#[derive(Debug, Clone)]
pub struct ResolvedMap {
    modes: Vec<Mode>,
    index: HashMap<String, usize>,
}

impl ResolvedMap {
    pub(crate) fn new(modes: Vec<Mode>) -> Self {
        let mut index: HashMap<String, usize> = modes
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        index.insert(String::new(), 0);
        Self { modes, index }
    }

    /// Built-in map used until a document is installed: one default mode in
    /// which every tap types `?`.
    pub fn fallback() -> Self {
        let question = HotkeyEntry::KeySequence(KeyAction::text("?"));
        let mut slots: [HotkeyEntry; SLOT_COUNT] = std::array::from_fn(|_| question.clone());
        slots[0] = HotkeyEntry::Empty;
        Self::new(vec![Mode {
            name: "default".to_string(),
            slots,
            is_default: true,
            keep_in_stack: true,
            enter: Vec::new(),
            exit: Vec::new(),
        }])
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn mode(&self, index: usize) -> Option<&Mode> {
        self.modes.get(index)
    }

    /// Mode at index 0
    pub fn default_mode(&self) -> &Mode {
        &self.modes[0]
    }

    /// Final index of a mode name; `""` maps to the default mode
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// An entry with its targets turned back into mode names.
    pub fn symbolic_entry(&self, mode: usize, slot: usize) -> Option<HotkeyEntry<String>> {
        let entry = self.modes.get(mode)?.slots.get(slot)?;
        let mut name = |i: &usize| -> Result<String, Infallible> {
            Ok(self.modes.get(*i).map_or_else(String::new, |m| m.name.clone()))
        };
        match entry.map_targets(&mut name) {
            Ok(entry) => Some(entry),
            Err(never) => match never {},
        }
    }

    /// Resolve a symbolic entry against this map's mode names.
    pub fn resolve_entry(&self, entry: &HotkeyEntry<String>) -> Result<HotkeyEntry, MapError> {
        resolve::resolve_targets(entry, &self.index, "")
    }
}

impl Default for ResolvedMap {
    fn default() -> Self {
        Self::fallback()
    }
}

impl FromStr for ResolvedMap {
    type Err = MapError;

    /// Parse and resolve a YAML tap map document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve::resolve(document::parse_document(s)?)
    }
}

/// Parse a 5-character annotation (`.` = 1, `-` = 0, MSB first) to a mask.
pub fn parse_annotation(annotation: &str) -> Option<u8> {
    if annotation.chars().count() != 5 {
        return None;
    }
    annotation.chars().try_fold(0u8, |mask, c| match c {
        '.' => Some(mask << 1 | 1),
        '-' => Some(mask << 1),
        _ => None,
    })
}

/// Annotation for a mask, MSB first (the form tap map documents use).
pub fn annotation(mask: u8) -> String {
    (0..5)
        .rev()
        .map(|bit| if mask >> bit & 1 == 1 { '.' } else { '-' })
        .collect()
}

impl fmt::Display for ResolvedMap {
    /// Mode-by-mode dump of every bound slot.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mode) in self.modes.iter().enumerate() {
            writeln!(f, "Mode {i}: {}", mode.name)?;
            for slot in 1..SLOT_COUNT {
                let Some(entry) = self.symbolic_entry(i, slot) else {
                    continue;
                };
                if entry.is_empty() {
                    continue;
                }
                let left = annotation(slot as u8);
                let right: String = left.chars().rev().collect();
                writeln!(f, "  Slot {slot:02} (Left: {left}, Right: {right}): {entry}")?;
            }
        }
        Ok(())
    }
}
