//! RDP Scancodes and the Scancode Classifier
//!
//! A TS_KEYBOARD_EVENT carries an 8-bit `keyCode` and a set of
//! `keyboardFlags`. The two are folded into a single [`Scancode`]: the low
//! seven bits of the key code, plus the E0 (`KBDFLAGS_EXTENDED`) and E1
//! (`KBDFLAGS_EXTENDED1`) prefix bits kept in place at 0x100 and 0x200.
//!
//! ```text
//! keyCode 0x1D + KBDFLAGS_EXTENDED   -> 0x11D  (right ctrl)
//! keyCode 0x1D + KBDFLAGS_EXTENDED1  -> 0x21D  (pause)
//! ```
//!
//! [`classify`] sorts scancodes into the handful of behaviours the
//! normalizer distinguishes. It has no state and no failure case.

use enumflags2::{bitflags, BitFlags};
use std::fmt;

/// TS_KEYBOARD_EVENT keyboardFlags
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardFlag {
    /// E0 prefix
    Extended = 0x0100,
    /// E1 prefix
    Extended1 = 0x0200,
    /// Key was already down (repeat)
    Down = 0x4000,
    /// Key release
    Release = 0x8000,
}

/// Combined protocol key code and prefix bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scancode(u16);

impl Scancode {
    const KEY_CODE_MASK: u16 = 0x7F;
    const PREFIX_MASK: u16 = 0x0300;

    /// Wrap an already combined scancode value
    pub const fn new(raw: u16) -> Self {
        Self(raw & (Self::KEY_CODE_MASK | Self::PREFIX_MASK))
    }

    /// Build a scancode from the raw PDU fields
    pub fn from_kbd_event(key_code: u16, flags: u16) -> Self {
        Self((key_code & Self::KEY_CODE_MASK) | (flags & Self::PREFIX_MASK))
    }

    /// Build a scancode from a key code and decoded flags
    pub fn from_parts(key_code: u8, flags: BitFlags<KeyboardFlag>) -> Self {
        Self::from_kbd_event(key_code as u16, flags.bits())
    }

    /// Combined value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Key code without prefix bits
    pub const fn key_code(self) -> u8 {
        (self.0 & Self::KEY_CODE_MASK) as u8
    }

    /// E0 prefix present
    pub const fn is_extended(self) -> bool {
        self.0 & KeyboardFlag::Extended as u16 != 0
    }

    /// E1 prefix present
    pub const fn is_extended1(self) -> bool {
        self.0 & KeyboardFlag::Extended1 as u16 != 0
    }
}

impl fmt::Display for Scancode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

/// Scancodes the classifier cares about
#[allow(missing_docs)]
pub mod codes {
    use super::Scancode;

    pub const TAB: Scancode = Scancode::new(0x00F);
    pub const LCTRL: Scancode = Scancode::new(0x01D);
    pub const LSHIFT: Scancode = Scancode::new(0x02A);
    pub const RSHIFT: Scancode = Scancode::new(0x036);
    pub const LALT: Scancode = Scancode::new(0x038);
    pub const CAPS_LOCK: Scancode = Scancode::new(0x03A);
    pub const NUM_LOCK: Scancode = Scancode::new(0x045);
    pub const SCROLL_LOCK: Scancode = Scancode::new(0x046);
    pub const RCTRL: Scancode = Scancode::new(0x11D);
    pub const RALT: Scancode = Scancode::new(0x138);
    pub const LWIN: Scancode = Scancode::new(0x15B);
    pub const RWIN: Scancode = Scancode::new(0x15C);
    pub const MENU: Scancode = Scancode::new(0x15D);
    pub const PAUSE: Scancode = Scancode::new(0x21D);
}

/// Behavioural category of a scancode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    /// Shift, ctrl, alt, win, menu, caps and num lock: forwarded verbatim
    Modifier,
    /// Scroll lock: debounced toggle, forwarded verbatim
    ScrollLock,
    /// Tab: spurious releases suppressed, otherwise repeat-normalized
    Tab,
    /// Pause: forwarded verbatim, arms the numlock skip
    Pause,
    /// Everything else: repeat-normalized when mapped
    Default,
}

/// Classify a scancode
pub fn classify(scancode: Scancode) -> KeyCategory {
    use codes::*;

    match scancode {
        LSHIFT | RSHIFT | LCTRL | RCTRL | LALT | RALT | CAPS_LOCK | NUM_LOCK | LWIN | RWIN
        | MENU => KeyCategory::Modifier,
        SCROLL_LOCK => KeyCategory::ScrollLock,
        TAB => KeyCategory::Tab,
        PAUSE => KeyCategory::Pause,
        _ => KeyCategory::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scancode_from_kbd_event() {
        assert_eq!(Scancode::from_kbd_event(0x1E, 0).raw(), 0x01E);
        assert_eq!(Scancode::from_kbd_event(0x1D, 0x0100), codes::RCTRL);
        assert_eq!(Scancode::from_kbd_event(0x1D, 0x0200), codes::PAUSE);
    }

    #[test]
    fn test_scancode_ignores_direction_flags() {
        // KBDFLAGS_RELEASE and KBDFLAGS_DOWN never change the identity
        assert_eq!(Scancode::from_kbd_event(0x0F, 0x8000), codes::TAB);
        assert_eq!(Scancode::from_kbd_event(0x0F, 0x4000), codes::TAB);
        assert_eq!(
            Scancode::from_kbd_event(0x38, 0x8000 | 0x0100),
            codes::RALT
        );
    }

    #[test]
    fn test_scancode_from_parts() {
        let flags = KeyboardFlag::Extended | KeyboardFlag::Release;
        let scancode = Scancode::from_parts(0x5B, flags);
        assert_eq!(scancode, codes::LWIN);
        assert!(scancode.is_extended());
        assert!(!scancode.is_extended1());
        assert_eq!(scancode.key_code(), 0x5B);
    }

    #[test]
    fn test_key_code_high_bit_masked() {
        assert_eq!(Scancode::from_kbd_event(0xC5, 0).raw(), 0x045);
    }

    #[test]
    fn test_classify_modifiers() {
        for scancode in [
            codes::LSHIFT,
            codes::RSHIFT,
            codes::LCTRL,
            codes::RCTRL,
            codes::LALT,
            codes::RALT,
            codes::CAPS_LOCK,
            codes::NUM_LOCK,
            codes::LWIN,
            codes::RWIN,
            codes::MENU,
        ] {
            assert_eq!(classify(scancode), KeyCategory::Modifier, "{}", scancode);
        }
    }

    #[test]
    fn test_classify_special_keys() {
        assert_eq!(classify(codes::SCROLL_LOCK), KeyCategory::ScrollLock);
        assert_eq!(classify(codes::TAB), KeyCategory::Tab);
        assert_eq!(classify(codes::PAUSE), KeyCategory::Pause);
    }

    #[test]
    fn test_classify_default() {
        // A, Enter, extended Home, and an unassigned E1 code
        for raw in [0x01E, 0x01C, 0x147, 0x2FF] {
            assert_eq!(classify(Scancode::new(raw)), KeyCategory::Default);
        }
    }

    #[test]
    fn test_scancode_display() {
        assert_eq!(codes::PAUSE.to_string(), "0x21D");
        assert_eq!(codes::TAB.to_string(), "0x00F");
    }
}
