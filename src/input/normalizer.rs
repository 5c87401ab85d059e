//! Key Event Normalizer
//!
//! RDP clients report a held key as a stream of presses with no release in
//! between. The local input stack expects a repeat to look like
//! release-then-press. For ordinary keys every press is therefore emitted as
//! `release(k), press(k)`: harmless on a first press, and an exact repeat
//! otherwise.
//!
//! A few keys get special treatment:
//!
//! | Category | Press | Release |
//! |----------|-------|---------|
//! | Modifier | press | release |
//! | Scroll lock | debounced toggle, press | clear latch, release |
//! | Tab | release, press | release, or nothing if no press was seen |
//! | Pause | press, arm numlock skip | release, arm numlock skip |
//! | Default | release, press | release |
//!
//! Pause arrives as a two-key composite whose second half has the numlock
//! scancode. The numlock skip flag is consumed by whatever key event comes
//! next; the event is dropped only if it is that numlock.

use crate::input::host::KeyAction;
use crate::input::scancode::{classify, codes, KeyCategory, Scancode};
use crate::input::state::KeyboardState;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A key event from the protocol, with its local keycode already resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key pressed (true) or released (false)
    pub down: bool,
    /// Local keycode, 0 when the local keymap has no entry
    pub local_keycode: u32,
    /// TS_KEYBOARD_EVENT keyCode
    pub protocol_keycode: u16,
    /// TS_KEYBOARD_EVENT keyboardFlags
    pub protocol_flags: u16,
}

impl KeyEvent {
    /// Key press
    pub fn press(local_keycode: u32, scancode: Scancode) -> Self {
        Self::from_scancode(true, local_keycode, scancode)
    }

    /// Key release
    pub fn release(local_keycode: u32, scancode: Scancode) -> Self {
        Self::from_scancode(false, local_keycode, scancode)
    }

    fn from_scancode(down: bool, local_keycode: u32, scancode: Scancode) -> Self {
        Self {
            down,
            local_keycode,
            protocol_keycode: scancode.key_code() as u16,
            protocol_flags: scancode.raw() & 0x0300,
        }
    }

    /// Combined protocol scancode
    pub fn scancode(&self) -> Scancode {
        Scancode::from_kbd_event(self.protocol_keycode, self.protocol_flags)
    }
}

/// Why an event produced no actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No local keycode for this scancode
    Unmapped,
    /// Numlock half of a pause sequence
    PauseNumLock,
    /// Tab release without a tracked press
    TabArtifact,
}

/// What the normalizer did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Passed through unchanged
    Forwarded,
    /// Rewritten with repeat normalization
    Normalized,
    /// Nothing emitted
    Dropped(DropReason),
}

/// Translate one key event, appending the resulting actions to `out`
pub fn normalize(
    state: &mut KeyboardState,
    event: &KeyEvent,
    out: &mut Vec<KeyAction>,
) -> Disposition {
    let scancode = event.scancode();
    let keycode = event.local_keycode;

    debug!(
        "Key event: down={}, scancode={}, keyCode=0x{:04X}, flags=0x{:04X}, keycode={}",
        event.down, scancode, event.protocol_keycode, event.protocol_flags, keycode
    );

    if state.skip_numlock {
        state.skip_numlock = false;
        if scancode == codes::NUM_LOCK {
            debug!("Dropping numlock half of pause sequence");
            return Disposition::Dropped(DropReason::PauseNumLock);
        }
    }

    match classify(scancode) {
        KeyCategory::Modifier => {
            forward(event.down, keycode, out);
            Disposition::Forwarded
        }

        KeyCategory::ScrollLock => {
            if event.down {
                if !state.scroll_lock_down {
                    state.scroll_lock_down = true;
                    state.scroll_lock_state = !state.scroll_lock_state;
                    debug!("Scroll lock toggled: {}", state.scroll_lock_state);
                }
            } else {
                state.scroll_lock_down = false;
            }
            forward(event.down, keycode, out);
            Disposition::Forwarded
        }

        KeyCategory::Tab => {
            let was_down = state.tab_down;
            state.tab_down = event.down;
            if !event.down && !was_down {
                // mstsc sends a tab release before and after a sync event
                state.skip_numlock = false;
                debug!("Ignoring tab release with no tracked press");
                return Disposition::Dropped(DropReason::TabArtifact);
            }
            repeat_normalized(event.down, keycode, out);
            Disposition::Normalized
        }

        KeyCategory::Pause => {
            forward(event.down, keycode, out);
            state.skip_numlock = true;
            Disposition::Forwarded
        }

        KeyCategory::Default => {
            if keycode == 0 {
                trace!("No local keycode for scancode {}", scancode);
                return Disposition::Dropped(DropReason::Unmapped);
            }
            repeat_normalized(event.down, keycode, out);
            Disposition::Normalized
        }
    }
}

fn forward(down: bool, keycode: u32, out: &mut Vec<KeyAction>) {
    let action = KeyAction { down, keycode };
    trace!("Emit {}", action);
    out.push(action);
}

fn repeat_normalized(down: bool, keycode: u32, out: &mut Vec<KeyAction>) {
    forward(false, keycode, out);
    if down {
        forward(true, keycode, out);
    }
}
