//! Virtual keyboard device using evdev/uinput
//!
//! Creates a virtual keyboard that the compositor/X server treats like any
//! other attached keyboard. uinput has no notion of text, so unicode events
//! are rejected (not counted as accepted) and left for the caller to log.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key,
};
use tracing::debug;

use crate::error::OutputError;
use crate::types::{KeyCode, KeyEvent};
use crate::vk;
use crate::KeySink;

/// Virtual keyboard device
pub struct UinputKeyboard {
    device: VirtualDevice,
    name: String,
}

impl UinputKeyboard {
    /// Create a new virtual keyboard
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and `libinput list-devices`)
    pub fn new(name: &str) -> Result<Self, OutputError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0u16..=0xFF {
            if let Some(key) = evdev_key(code) {
                keys.insert(key);
            }
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(OutputError::CreateDevice)?
            .name(name)
            .with_keys(&keys)
            .map_err(OutputError::CreateDevice)?
            .build()
            .map_err(OutputError::CreateDevice)?;

        Ok(Self {
            device,
            name: name.to_string(),
        })
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }
}

impl KeySink for UinputKeyboard {
    fn send_batch(&mut self, events: &[KeyEvent]) -> Result<usize, OutputError> {
        let mut accepted = 0;
        for event in events {
            let key = match event.code {
                KeyCode::Vk(code) => evdev_key(code),
                KeyCode::Unicode(_) => None,
            };
            let Some(key) = key else {
                debug!("{}: no uinput key for {event}", self.name);
                continue;
            };
            // One event per emit: each gets its own SYN_REPORT so a press
            // and release of the same key are never coalesced.
            let value = if event.up { 0 } else { 1 };
            self.device
                .emit(&[InputEvent::new(EventType::KEY, key.code(), value)])
                .map_err(OutputError::Emit)?;
            accepted += 1;
        }
        Ok(accepted)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Map a virtual-key code to the evdev key it corresponds to on a US layout
fn evdev_key(code: u16) -> Option<Key> {
    const LETTERS: [Key; 26] = [
        Key::KEY_A, Key::KEY_B, Key::KEY_C, Key::KEY_D, Key::KEY_E, Key::KEY_F,
        Key::KEY_G, Key::KEY_H, Key::KEY_I, Key::KEY_J, Key::KEY_K, Key::KEY_L,
        Key::KEY_M, Key::KEY_N, Key::KEY_O, Key::KEY_P, Key::KEY_Q, Key::KEY_R,
        Key::KEY_S, Key::KEY_T, Key::KEY_U, Key::KEY_V, Key::KEY_W, Key::KEY_X,
        Key::KEY_Y, Key::KEY_Z,
    ];
    const DIGITS: [Key; 10] = [
        Key::KEY_0, Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4,
        Key::KEY_5, Key::KEY_6, Key::KEY_7, Key::KEY_8, Key::KEY_9,
    ];
    const FUNCTION: [Key; 24] = [
        Key::KEY_F1, Key::KEY_F2, Key::KEY_F3, Key::KEY_F4, Key::KEY_F5,
        Key::KEY_F6, Key::KEY_F7, Key::KEY_F8, Key::KEY_F9, Key::KEY_F10,
        Key::KEY_F11, Key::KEY_F12, Key::KEY_F13, Key::KEY_F14, Key::KEY_F15,
        Key::KEY_F16, Key::KEY_F17, Key::KEY_F18, Key::KEY_F19, Key::KEY_F20,
        Key::KEY_F21, Key::KEY_F22, Key::KEY_F23, Key::KEY_F24,
    ];

    let key = match code {
        0x41..=0x5A => LETTERS[(code - vk::KEY_A) as usize],
        0x30..=0x39 => DIGITS[(code - vk::KEY_0) as usize],
        0x70..=0x87 => FUNCTION[(code - vk::F1) as usize],
        vk::BACK => Key::KEY_BACKSPACE,
        vk::TAB => Key::KEY_TAB,
        vk::RETURN => Key::KEY_ENTER,
        vk::SHIFT | vk::LSHIFT => Key::KEY_LEFTSHIFT,
        vk::RSHIFT => Key::KEY_RIGHTSHIFT,
        vk::CONTROL | vk::LCONTROL => Key::KEY_LEFTCTRL,
        vk::RCONTROL => Key::KEY_RIGHTCTRL,
        vk::MENU | vk::LMENU => Key::KEY_LEFTALT,
        vk::RMENU => Key::KEY_RIGHTALT,
        vk::LWIN => Key::KEY_LEFTMETA,
        vk::RWIN => Key::KEY_RIGHTMETA,
        vk::APPS => Key::KEY_COMPOSE,
        vk::PAUSE => Key::KEY_PAUSE,
        vk::CAPITAL => Key::KEY_CAPSLOCK,
        vk::ESCAPE => Key::KEY_ESC,
        vk::SPACE => Key::KEY_SPACE,
        vk::PRIOR => Key::KEY_PAGEUP,
        vk::NEXT => Key::KEY_PAGEDOWN,
        vk::END => Key::KEY_END,
        vk::HOME => Key::KEY_HOME,
        vk::LEFT => Key::KEY_LEFT,
        vk::UP => Key::KEY_UP,
        vk::RIGHT => Key::KEY_RIGHT,
        vk::DOWN => Key::KEY_DOWN,
        vk::SNAPSHOT => Key::KEY_SYSRQ,
        vk::INSERT => Key::KEY_INSERT,
        vk::DELETE => Key::KEY_DELETE,
        vk::NUMLOCK => Key::KEY_NUMLOCK,
        vk::SCROLL => Key::KEY_SCROLLLOCK,
        vk::OEM_1 => Key::KEY_SEMICOLON,
        vk::OEM_PLUS => Key::KEY_EQUAL,
        vk::OEM_COMMA => Key::KEY_COMMA,
        vk::OEM_MINUS => Key::KEY_MINUS,
        vk::OEM_PERIOD => Key::KEY_DOT,
        vk::OEM_2 => Key::KEY_SLASH,
        vk::OEM_3 => Key::KEY_GRAVE,
        vk::OEM_4 => Key::KEY_LEFTBRACE,
        vk::OEM_5 => Key::KEY_BACKSLASH,
        vk::OEM_6 => Key::KEY_RIGHTBRACE,
        vk::OEM_7 => Key::KEY_APOSTROPHE,
        _ => return None,
    };
    Some(key)
}
