//! Per-Device Keyboard State
//!
//! One [`KeyboardState`] exists per attached keyboard. Only the normalizer
//! and the lock synchronizer mutate it.

use crate::input::error::{KeyboardError, Result};
use serde::{Deserialize, Serialize};

/// Lowest keycode the core protocol can transport
pub const MIN_KEYCODE: u32 = 8;
/// Highest keycode the core protocol can transport
pub const MAX_KEYCODE: u32 = 255;

/// X11 keycode of Caps Lock on the built-in evdev layout
pub const CAPS_LOCK_KEYCODE: u32 = 66;
/// X11 keycode of Num Lock on the built-in evdev layout
pub const NUM_LOCK_KEYCODE: u32 = 77;
/// X11 keycode of Scroll Lock on the built-in evdev layout
pub const SCROLL_LOCK_KEYCODE: u32 = 78;

/// Local keycodes used to emit corrective lock key pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockKeycodes {
    /// Caps Lock keycode
    pub caps: u32,
    /// Num Lock keycode
    pub num: u32,
    /// Scroll Lock keycode
    pub scroll: u32,
}

impl Default for LockKeycodes {
    fn default() -> Self {
        Self {
            caps: CAPS_LOCK_KEYCODE,
            num: NUM_LOCK_KEYCODE,
            scroll: SCROLL_LOCK_KEYCODE,
        }
    }
}

impl LockKeycodes {
    /// All three keycodes in caps, num, scroll order
    pub fn all(&self) -> [u32; 3] {
        [self.caps, self.num, self.scroll]
    }

    /// Check every keycode against the core protocol range
    pub fn validate(&self) -> Result<()> {
        match self
            .all()
            .into_iter()
            .find(|keycode| !(MIN_KEYCODE..=MAX_KEYCODE).contains(keycode))
        {
            Some(keycode) => Err(KeyboardError::InvalidKeycode(keycode)),
            None => Ok(()),
        }
    }
}

/// Translation state of one keyboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    /// A tab press has been forwarded and not yet released
    pub tab_down: bool,

    /// Scroll Lock is physically held (press debounce latch)
    pub scroll_lock_down: bool,

    /// Logical Scroll Lock state. The local subsystem has no modifier bit for
    /// it, so it lives here.
    pub scroll_lock_state: bool,

    /// Drop the next numlock event; set while a pause sequence is in flight
    pub skip_numlock: bool,

    /// Keycodes for lock synchronization pulses
    pub lock_keycodes: LockKeycodes,
}

impl KeyboardState {
    /// Fresh state using `lock_keycodes`
    pub fn new(lock_keycodes: LockKeycodes) -> Self {
        Self {
            lock_keycodes,
            ..Self::default()
        }
    }
}
