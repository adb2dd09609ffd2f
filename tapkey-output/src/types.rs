//! Physical key event types shared by all output backends

use std::fmt;

/// What a physical event presses or releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Virtual-key code (see [`crate::vk`]).
    Vk(u16),
    /// Direct character injection, bypassing the keyboard layout.
    Unicode(char),
}

/// One press or release handed to a [`crate::KeySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub up: bool,
    /// Milliseconds timestamp; 0 lets the backend stamp it.
    pub time: u32,
}

impl KeyEvent {
    pub fn key(vk: u16, up: bool) -> Self {
        Self {
            code: KeyCode::Vk(vk),
            up,
            time: 0,
        }
    }

    pub fn unicode(ch: char, up: bool) -> Self {
        Self {
            code: KeyCode::Unicode(ch),
            up,
            time: 0,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.up { '↑' } else { '↓' };
        match self.code {
            KeyCode::Vk(vk) => write!(f, "{arrow}VK_{vk:02X}"),
            KeyCode::Unicode(ch) => write!(f, "{arrow}U+{:04X}({ch})", ch as u32),
        }
    }
}
