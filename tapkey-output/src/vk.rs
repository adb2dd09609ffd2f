//! Virtual-key code table.
//!
//! Key actions address keys by virtual-key code (the `VK_<hex>` numbering
//! used by tap map documents). Backends translate these into whatever the
//! injection primitive understands.

pub const BACK: u16 = 0x08;
pub const TAB: u16 = 0x09;
pub const RETURN: u16 = 0x0D;
pub const SHIFT: u16 = 0x10;
pub const CONTROL: u16 = 0x11;
pub const MENU: u16 = 0x12;
pub const PAUSE: u16 = 0x13;
pub const CAPITAL: u16 = 0x14;
pub const ESCAPE: u16 = 0x1B;
pub const SPACE: u16 = 0x20;
pub const PRIOR: u16 = 0x21;
pub const NEXT: u16 = 0x22;
pub const END: u16 = 0x23;
pub const HOME: u16 = 0x24;
pub const LEFT: u16 = 0x25;
pub const UP: u16 = 0x26;
pub const RIGHT: u16 = 0x27;
pub const DOWN: u16 = 0x28;
pub const SNAPSHOT: u16 = 0x2C;
pub const INSERT: u16 = 0x2D;
pub const DELETE: u16 = 0x2E;
/// `'0'`; digits run contiguously to `'9'` (0x39).
pub const KEY_0: u16 = 0x30;
/// `'A'`; letters run contiguously to `'Z'` (0x5A).
pub const KEY_A: u16 = 0x41;
pub const LWIN: u16 = 0x5B;
pub const RWIN: u16 = 0x5C;
pub const APPS: u16 = 0x5D;
/// F1; function keys run contiguously to F24 (0x87).
pub const F1: u16 = 0x70;
pub const NUMLOCK: u16 = 0x90;
pub const SCROLL: u16 = 0x91;
pub const LSHIFT: u16 = 0xA0;
pub const RSHIFT: u16 = 0xA1;
pub const LCONTROL: u16 = 0xA2;
pub const RCONTROL: u16 = 0xA3;
pub const LMENU: u16 = 0xA4;
pub const RMENU: u16 = 0xA5;
/// `;:` on a US layout.
pub const OEM_1: u16 = 0xBA;
pub const OEM_PLUS: u16 = 0xBB;
pub const OEM_COMMA: u16 = 0xBC;
pub const OEM_MINUS: u16 = 0xBD;
pub const OEM_PERIOD: u16 = 0xBE;
/// `/?`
pub const OEM_2: u16 = 0xBF;
/// `` `~ ``
pub const OEM_3: u16 = 0xC0;
/// `[{`
pub const OEM_4: u16 = 0xDB;
/// `\|`
pub const OEM_5: u16 = 0xDC;
/// `]}`
pub const OEM_6: u16 = 0xDD;
/// `'"`
pub const OEM_7: u16 = 0xDE;

/// Letter key for an ASCII letter (either case).
pub fn letter(c: char) -> Option<u16> {
    c.is_ascii_alphabetic()
        .then(|| KEY_A + (c.to_ascii_uppercase() as u16 - 'A' as u16))
}

/// Digit key for an ASCII digit.
pub fn digit(c: char) -> Option<u16> {
    c.is_ascii_digit().then(|| KEY_0 + (c as u16 - '0' as u16))
}

/// Function key F`n` for `n` in 1..=24.
pub fn function(n: u8) -> Option<u16> {
    (1..=24).contains(&n).then(|| F1 + n as u16 - 1)
}

/// Whether the code is one of the modifier keys (generic or sided).
pub fn is_modifier(code: u16) -> bool {
    matches!(
        code,
        SHIFT | CONTROL | MENU | LWIN | RWIN | LSHIFT..=RMENU
    )
}
