//! Key names, modifier bitmasks and character mapping.
//!
//! # Parsing syntax
//!
//! ```text
//! A            → key VK_41
//! Enter        → key VK_0D
//! Esc          → key VK_1B       (alias)
//! VK_0D        → key VK_0D       (hex literal)
//! Ctrl+C       → key VK_43 + LCTRL
//! Shift+Alt+F3 → key VK_72 + LSHIFT|LALT
//! Ctrl+Shift   → modifiers only  (LCTRL|LSHIFT)
//! ```

use std::fmt;

use tapkey_output::vk;
use thiserror::Error;

/// Modifier bitmask constants.
///
/// Same bit positions as the first byte of a HID keyboard report, one bit
/// per sided modifier key.
pub mod mods {
    pub const LCTRL: u8 = 0x01;
    pub const LSHIFT: u8 = 0x02;
    pub const LALT: u8 = 0x04;
    pub const LGUI: u8 = 0x08;
    pub const RCTRL: u8 = 0x10;
    pub const RSHIFT: u8 = 0x20;
    pub const RALT: u8 = 0x40;
    pub const RGUI: u8 = 0x80;
}

/// Error type for parsing a key name or combination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("unknown key: \"{0}\"")]
    UnknownKey(String),

    #[error("more than one non-modifier key in \"{0}\"")]
    MultipleKeys(String),

    #[error("empty key combo")]
    EmptyCombo,
}

/// Parse a modifier name to its bitmask value.
pub fn parse_modifier(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" | "lctrl" | "lcontrol" => Some(mods::LCTRL),
        "shift" | "lshift" => Some(mods::LSHIFT),
        "alt" | "lalt" | "menu" | "lmenu" => Some(mods::LALT),
        "gui" | "win" | "super" | "meta" | "lgui" | "lwin" | "lsuper" => Some(mods::LGUI),
        "rctrl" | "rcontrol" => Some(mods::RCTRL),
        "rshift" => Some(mods::RSHIFT),
        "ralt" | "altgr" | "rmenu" => Some(mods::RALT),
        "rgui" | "rwin" | "rsuper" | "rmeta" => Some(mods::RGUI),
        _ => None,
    }
}

/// Virtual key that presses a single modifier bit.
pub fn modifier_vk(bit: u8) -> Option<u16> {
    match bit {
        mods::LCTRL => Some(vk::LCONTROL),
        mods::LSHIFT => Some(vk::LSHIFT),
        mods::LALT => Some(vk::LMENU),
        mods::LGUI => Some(vk::LWIN),
        mods::RCTRL => Some(vk::RCONTROL),
        mods::RSHIFT => Some(vk::RSHIFT),
        mods::RALT => Some(vk::RMENU),
        mods::RGUI => Some(vk::RWIN),
        _ => None,
    }
}

/// Single-bit masks set in `mask`, lowest bit first.
pub fn modifier_bits(mask: u8) -> impl DoubleEndedIterator<Item = u8> {
    (0..8).map(|i| 1u8 << i).filter(move |bit| mask & bit != 0)
}

/// Parse a non-modifier key name to its virtual-key code.
pub fn parse_key(name: &str) -> Option<u16> {
    if let Some(hex) = name
        .strip_prefix("VK_")
        .or_else(|| name.strip_prefix("vk_"))
    {
        return u16::from_str_radix(hex, 16).ok().filter(|&c| c <= 0xFF);
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match char_to_vk(c) {
            Some((code, 0)) => Some(code),
            // Upper-case letters name the key, not shift+key
            Some((code, _)) if c.is_ascii_alphabetic() => Some(code),
            _ => None,
        };
    }

    let lower = name.to_ascii_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return vk::function(n);
    }

    let code = match lower.as_str() {
        "escape" | "esc" => vk::ESCAPE,
        "backspace" | "back" | "bksp" => vk::BACK,
        "space" | "spc" => vk::SPACE,
        "tab" => vk::TAB,
        "enter" | "return" | "ret" => vk::RETURN,
        "left" => vk::LEFT,
        "right" => vk::RIGHT,
        "up" => vk::UP,
        "down" => vk::DOWN,
        "insert" | "ins" => vk::INSERT,
        "delete" | "del" => vk::DELETE,
        "pageup" | "pgup" => vk::PRIOR,
        "pagedown" | "pgdown" | "pgdn" => vk::NEXT,
        "home" => vk::HOME,
        "end" => vk::END,
        "capslock" | "caps" => vk::CAPITAL,
        "printscreen" | "prtsc" | "print" => vk::SNAPSHOT,
        "pause" => vk::PAUSE,
        "numlock" => vk::NUMLOCK,
        "scrolllock" => vk::SCROLL,
        "apps" | "context" => vk::APPS,
        "plus" => vk::OEM_PLUS,
        "minus" => vk::OEM_MINUS,
        "comma" => vk::OEM_COMMA,
        "period" | "dot" => vk::OEM_PERIOD,
        _ => return None,
    };
    Some(code)
}

/// A parsed `+`-joined key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combo {
    /// The single non-modifier key, if any
    pub key: Option<u16>,
    pub modifiers: u8,
}

/// Parse `Ctrl+Shift+A`, `Enter`, `VK_0D`, or a modifier-only combo.
pub fn parse_combo(s: &str) -> Result<Combo, ParseKeyError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseKeyError::EmptyCombo);
    }

    let mut combo = Combo {
        key: None,
        modifiers: 0,
    };
    for part in s.split('+').map(str::trim) {
        if part.is_empty() {
            return Err(ParseKeyError::UnknownKey(s.to_string()));
        }
        if let Some(m) = parse_modifier(part) {
            combo.modifiers |= m;
            continue;
        }
        let code = parse_key(part).ok_or_else(|| ParseKeyError::UnknownKey(part.to_string()))?;
        if combo.key.replace(code).is_some() {
            return Err(ParseKeyError::MultipleKeys(s.to_string()));
        }
    }
    Ok(combo)
}

/// Map a character to the key that types it on a US layout, plus the
/// modifiers needed (LSHIFT for upper case and shifted punctuation).
pub fn char_to_vk(c: char) -> Option<(u16, u8)> {
    if let Some(code) = vk::letter(c) {
        let shift = if c.is_ascii_uppercase() { mods::LSHIFT } else { 0 };
        return Some((code, shift));
    }
    if let Some(code) = vk::digit(c) {
        return Some((code, 0));
    }

    let plain = match c {
        ' ' => Some(vk::SPACE),
        '\n' => Some(vk::RETURN),
        '\t' => Some(vk::TAB),
        ';' => Some(vk::OEM_1),
        '=' => Some(vk::OEM_PLUS),
        ',' => Some(vk::OEM_COMMA),
        '-' => Some(vk::OEM_MINUS),
        '.' => Some(vk::OEM_PERIOD),
        '/' => Some(vk::OEM_2),
        '`' => Some(vk::OEM_3),
        '[' => Some(vk::OEM_4),
        '\\' => Some(vk::OEM_5),
        ']' => Some(vk::OEM_6),
        '\'' => Some(vk::OEM_7),
        _ => None,
    };
    if let Some(code) = plain {
        return Some((code, 0));
    }

    let shifted = match c {
        ')' => vk::KEY_0,
        '!' => vk::KEY_0 + 1,
        '@' => vk::KEY_0 + 2,
        '#' => vk::KEY_0 + 3,
        '$' => vk::KEY_0 + 4,
        '%' => vk::KEY_0 + 5,
        '^' => vk::KEY_0 + 6,
        '&' => vk::KEY_0 + 7,
        '*' => vk::KEY_0 + 8,
        '(' => vk::KEY_0 + 9,
        ':' => vk::OEM_1,
        '+' => vk::OEM_PLUS,
        '<' => vk::OEM_COMMA,
        '_' => vk::OEM_MINUS,
        '>' => vk::OEM_PERIOD,
        '?' => vk::OEM_2,
        '~' => vk::OEM_3,
        '{' => vk::OEM_4,
        '|' => vk::OEM_5,
        '}' => vk::OEM_6,
        '"' => vk::OEM_7,
        _ => return None,
    };
    Some((shifted, mods::LSHIFT))
}

/// Human-readable name of a virtual key.
pub fn key_name(code: u16) -> String {
    match code {
        0x41..=0x5A | 0x30..=0x39 => return char::from(code as u8).to_string(),
        0x70..=0x87 => return format!("F{}", code - vk::F1 + 1),
        _ => {}
    }
    let name = match code {
        vk::ESCAPE => "Escape",
        vk::BACK => "Backspace",
        vk::SPACE => "Space",
        vk::TAB => "Tab",
        vk::RETURN => "Enter",
        vk::LEFT => "Left",
        vk::RIGHT => "Right",
        vk::UP => "Up",
        vk::DOWN => "Down",
        vk::INSERT => "Insert",
        vk::DELETE => "Delete",
        vk::PRIOR => "PageUp",
        vk::NEXT => "PageDown",
        vk::HOME => "Home",
        vk::END => "End",
        vk::CAPITAL => "CapsLock",
        vk::SNAPSHOT => "PrintScreen",
        vk::PAUSE => "Pause",
        vk::NUMLOCK => "NumLock",
        vk::SCROLL => "ScrollLock",
        vk::APPS => "Apps",
        vk::LSHIFT => "LShift",
        vk::RSHIFT => "RShift",
        vk::LCONTROL => "LCtrl",
        vk::RCONTROL => "RCtrl",
        vk::LMENU => "LAlt",
        vk::RMENU => "RAlt",
        vk::LWIN => "LWin",
        vk::RWIN => "RWin",
        _ => return format!("VK_{code:02X}"),
    };
    name.to_string()
}

/// Formats a modifier bitmask as `Ctrl+Shift` style text.
pub struct ModifierNames(pub u8);

impl fmt::Display for ModifierNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for bit in modifier_bits(self.0) {
            let name = match bit {
                mods::LCTRL => "Ctrl",
                mods::LSHIFT => "Shift",
                mods::LALT => "Alt",
                mods::LGUI => "Win",
                mods::RCTRL => "RCtrl",
                mods::RSHIFT => "RShift",
                mods::RALT => "RAlt",
                _ => "RWin",
            };
            if !first {
                f.write_str("+")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_aliases() {
        assert_eq!(parse_modifier("Ctrl"), Some(mods::LCTRL));
        assert_eq!(parse_modifier("CONTROL"), Some(mods::LCTRL));
        assert_eq!(parse_modifier("AltGr"), Some(mods::RALT));
        assert_eq!(parse_modifier("super"), Some(mods::LGUI));
        assert_eq!(parse_modifier("A"), None);
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Enter"), Some(vk::RETURN));
        assert_eq!(parse_key("return"), Some(vk::RETURN));
        assert_eq!(parse_key("Esc"), Some(vk::ESCAPE));
        assert_eq!(parse_key("PgUp"), Some(vk::PRIOR));
        assert_eq!(parse_key("F12"), Some(vk::F1 + 11));
        assert_eq!(parse_key("F25"), None);
        assert_eq!(parse_key("VK_0D"), Some(0x0D));
        assert_eq!(parse_key("VK_ZZ"), None);
        assert_eq!(parse_key("a"), Some(vk::KEY_A));
        assert_eq!(parse_key("A"), Some(vk::KEY_A));
        assert_eq!(parse_key(";"), Some(vk::OEM_1));
        assert_eq!(parse_key("?"), None);
        assert_eq!(parse_key("hello"), None);
    }

    #[test]
    fn parse_combos() {
        assert_eq!(
            parse_combo("Ctrl+C"),
            Ok(Combo {
                key: Some(vk::KEY_A + 2),
                modifiers: mods::LCTRL
            })
        );
        assert_eq!(
            parse_combo("Shift + Alt + F3"),
            Ok(Combo {
                key: Some(vk::F1 + 2),
                modifiers: mods::LSHIFT | mods::LALT
            })
        );
        assert_eq!(
            parse_combo("Ctrl+Shift"),
            Ok(Combo {
                key: None,
                modifiers: mods::LCTRL | mods::LSHIFT
            })
        );
        assert!(matches!(
            parse_combo("A+B"),
            Err(ParseKeyError::MultipleKeys(_))
        ));
        assert!(matches!(
            parse_combo("Ctrl+Nope"),
            Err(ParseKeyError::UnknownKey(_))
        ));
        assert_eq!(parse_combo("  "), Err(ParseKeyError::EmptyCombo));
    }

    #[test]
    fn char_mapping_adds_shift() {
        assert_eq!(char_to_vk('a'), Some((vk::KEY_A, 0)));
        assert_eq!(char_to_vk('A'), Some((vk::KEY_A, mods::LSHIFT)));
        assert_eq!(char_to_vk('!'), Some((vk::KEY_0 + 1, mods::LSHIFT)));
        assert_eq!(char_to_vk('/'), Some((vk::OEM_2, 0)));
        assert_eq!(char_to_vk('é'), None);
    }

    #[test]
    fn bits_in_order() {
        let bits: Vec<u8> = modifier_bits(mods::RALT | mods::LCTRL | mods::LSHIFT).collect();
        assert_eq!(bits, vec![mods::LCTRL, mods::LSHIFT, mods::RALT]);
        let rev: Vec<u8> = modifier_bits(mods::LCTRL | mods::LSHIFT).rev().collect();
        assert_eq!(rev, vec![mods::LSHIFT, mods::LCTRL]);
    }

    #[test]
    fn names_round_trip() {
        for code in [vk::RETURN, vk::KEY_A, vk::F1, vk::PRIOR, vk::KEY_0 + 7] {
            assert_eq!(parse_key(&key_name(code)), Some(code));
        }
        assert_eq!(key_name(0xE9), "VK_E9");
        assert_eq!(ModifierNames(mods::LCTRL | mods::LSHIFT).to_string(), "Ctrl+Shift");
    }
}
