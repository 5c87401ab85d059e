//! Scancode to Local Keycode Lookup
//!
//! The key event arriving from the driver shell normally already carries the
//! local keycode, resolved from the client's keyboard type. When it does not
//! (replays, tests) this table supplies the standard mapping for a PC/AT
//! keyboard on an evdev-based X server: Linux evdev keycode plus 8.

use crate::input::scancode::Scancode;

/// Offset between Linux evdev keycodes and X11 keycodes
pub const X11_KEYCODE_OFFSET: u32 = 8;

/// Linux evdev keycodes for the keys outside the linear range
#[allow(missing_docs)]
pub mod evdev {
    pub const KEY_KPENTER: u32 = 96;
    pub const KEY_RIGHTCTRL: u32 = 97;
    pub const KEY_KPSLASH: u32 = 98;
    pub const KEY_SYSRQ: u32 = 99;
    pub const KEY_RIGHTALT: u32 = 100;
    pub const KEY_HOME: u32 = 102;
    pub const KEY_UP: u32 = 103;
    pub const KEY_PAGEUP: u32 = 104;
    pub const KEY_LEFT: u32 = 105;
    pub const KEY_RIGHT: u32 = 106;
    pub const KEY_END: u32 = 107;
    pub const KEY_DOWN: u32 = 108;
    pub const KEY_PAGEDOWN: u32 = 109;
    pub const KEY_INSERT: u32 = 110;
    pub const KEY_DELETE: u32 = 111;
    pub const KEY_MUTE: u32 = 113;
    pub const KEY_VOLUMEDOWN: u32 = 114;
    pub const KEY_VOLUMEUP: u32 = 115;
    pub const KEY_PAUSE: u32 = 119;
    pub const KEY_LEFTMETA: u32 = 125;
    pub const KEY_RIGHTMETA: u32 = 126;
    pub const KEY_COMPOSE: u32 = 127;
    pub const KEY_NEXTSONG: u32 = 163;
    pub const KEY_PLAYPAUSE: u32 = 164;
    pub const KEY_PREVIOUSSONG: u32 = 165;
    pub const KEY_STOPCD: u32 = 166;
}

/// Resolves a protocol scancode to a local keycode
pub trait KeycodeLookup {
    /// Local keycode, or `None` when the scancode has no mapping
    fn keycode(&self, scancode: Scancode) -> Option<u32>;
}

/// Built-in PC/AT table producing X11 keycodes
#[derive(Debug, Clone, Copy, Default)]
pub struct X11Keycodes;

impl X11Keycodes {
    fn evdev_keycode(scancode: Scancode) -> Option<u32> {
        use evdev::*;

        let code = scancode.key_code() as u32;

        if scancode.is_extended1() {
            // E1 1D is the only E1 sequence a PC keyboard produces
            return (code == 0x1D).then_some(KEY_PAUSE);
        }

        if !scancode.is_extended() {
            // Escape .. keypad period, 102nd key, F11, F12 share numbering
            return match code {
                0x01..=0x53 | 0x56..=0x58 => Some(code),
                _ => None,
            };
        }

        let keycode = match code {
            0x10 => KEY_PREVIOUSSONG,
            0x19 => KEY_NEXTSONG,
            0x1C => KEY_KPENTER,
            0x1D => KEY_RIGHTCTRL,
            0x20 => KEY_MUTE,
            0x22 => KEY_PLAYPAUSE,
            0x24 => KEY_STOPCD,
            0x2E => KEY_VOLUMEDOWN,
            0x30 => KEY_VOLUMEUP,
            0x35 => KEY_KPSLASH,
            0x37 => KEY_SYSRQ,
            0x38 => KEY_RIGHTALT,
            0x47 => KEY_HOME,
            0x48 => KEY_UP,
            0x49 => KEY_PAGEUP,
            0x4B => KEY_LEFT,
            0x4D => KEY_RIGHT,
            0x4F => KEY_END,
            0x50 => KEY_DOWN,
            0x51 => KEY_PAGEDOWN,
            0x52 => KEY_INSERT,
            0x53 => KEY_DELETE,
            0x5B => KEY_LEFTMETA,
            0x5C => KEY_RIGHTMETA,
            0x5D => KEY_COMPOSE,
            _ => return None,
        };
        Some(keycode)
    }
}

impl KeycodeLookup for X11Keycodes {
    fn keycode(&self, scancode: Scancode) -> Option<u32> {
        Self::evdev_keycode(scancode).map(|code| code + X11_KEYCODE_OFFSET)
    }
}
