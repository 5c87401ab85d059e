//! Lock State Synchronizer
//!
//! Handles TS_SYNC_EVENT. The client states which lock keys should be on; we
//! compare against the local subsystem and pulse the lock keys that differ.
//! Caps and Num Lock are compared with the subsystem's modifier bits. Scroll
//! Lock has no modifier bit, so it is compared with the state we track.
//!
//! All three lock keys are released first. A release never flips a toggle,
//! so repeating the same request emits only those releases.

use crate::input::host::{KeyAction, LockModifiers};
use crate::input::state::KeyboardState;
use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// TS_SYNC_EVENT toggleFlags
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlag {
    /// TS_SYNC_SCROLL_LOCK
    ScrollLock = 0x1,
    /// TS_SYNC_NUM_LOCK
    NumLock = 0x2,
    /// TS_SYNC_CAPS_LOCK
    CapsLock = 0x4,
    /// TS_SYNC_KANA_LOCK (not tracked)
    KanaLock = 0x8,
}

/// Lock states requested by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Caps Lock should be on
    pub caps_lock: bool,
    /// Num Lock should be on
    pub num_lock: bool,
    /// Scroll Lock should be on
    pub scroll_lock: bool,
}

impl SyncRequest {
    /// Request with explicit states
    pub fn new(caps_lock: bool, num_lock: bool, scroll_lock: bool) -> Self {
        Self {
            caps_lock,
            num_lock,
            scroll_lock,
        }
    }

    /// Decode toggleFlags; unknown bits are ignored
    pub fn from_flags(flags: u32) -> Self {
        let flags = BitFlags::<SyncFlag>::from_bits_truncate(flags);
        Self {
            caps_lock: flags.contains(SyncFlag::CapsLock),
            num_lock: flags.contains(SyncFlag::NumLock),
            scroll_lock: flags.contains(SyncFlag::ScrollLock),
        }
    }

    /// Encode as toggleFlags
    pub fn to_flags(self) -> u32 {
        let mut flags = BitFlags::<SyncFlag>::empty();
        if self.caps_lock {
            flags |= SyncFlag::CapsLock;
        }
        if self.num_lock {
            flags |= SyncFlag::NumLock;
        }
        if self.scroll_lock {
            flags |= SyncFlag::ScrollLock;
        }
        flags.bits()
    }
}

/// Reconcile local lock state with `request`, appending actions to `out`
///
/// `current` is the subsystem's lock modifier state, read before any of the
/// emitted actions take effect.
pub fn synchronize(
    state: &mut KeyboardState,
    request: SyncRequest,
    current: LockModifiers,
    out: &mut Vec<KeyAction>,
) {
    let keys = state.lock_keycodes;

    debug!(
        "Sync: requested={:?}, local={:?}, scroll_lock_state={}",
        request, current, state.scroll_lock_state
    );

    for keycode in keys.all() {
        out.push(KeyAction::release(keycode));
    }
    state.scroll_lock_down = false;

    if current.caps_lock != request.caps_lock {
        info!("Sync: toggling caps lock");
        pulse(keys.caps, out);
    }

    if current.num_lock != request.num_lock {
        info!("Sync: toggling num lock");
        pulse(keys.num, out);
    }

    if state.scroll_lock_state != request.scroll_lock {
        info!("Sync: toggling scroll lock");
        pulse(keys.scroll, out);
        state.scroll_lock_state = !state.scroll_lock_state;
    }
}

fn pulse(keycode: u32, out: &mut Vec<KeyAction>) {
    out.push(KeyAction::press(keycode));
    out.push(KeyAction::release(keycode));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn releases() -> Vec<KeyAction> {
        vec![
            KeyAction::release(66),
            KeyAction::release(77),
            KeyAction::release(78),
        ]
    }

    #[test]
    fn test_sync_flags_decode() {
        let request = SyncRequest::from_flags(0x4 | 0x1);
        assert_eq!(request, SyncRequest::new(true, false, true));

        // Kana lock and unknown bits are ignored
        assert_eq!(SyncRequest::from_flags(0x8 | 0x100), SyncRequest::default());
    }

    #[test]
    fn test_sync_flags_encode() {
        assert_eq!(SyncRequest::new(true, true, true).to_flags(), 0x7);
        assert_eq!(SyncRequest::new(false, true, false).to_flags(), 0x2);
    }

    #[test]
    fn test_sync_already_consistent_only_releases() {
        let mut state = KeyboardState::default();
        let mut out = Vec::new();
        synchronize(
            &mut state,
            SyncRequest::default(),
            LockModifiers::default(),
            &mut out,
        );
        assert_eq!(out, releases());
    }

    #[test]
    fn test_sync_toggles_differing_locks() {
        let mut state = KeyboardState::default();
        let mut out = Vec::new();
        let current = LockModifiers {
            caps_lock: false,
            num_lock: true,
        };
        synchronize(&mut state, SyncRequest::new(true, false, true), current, &mut out);

        let mut expected = releases();
        expected.extend([
            KeyAction::press(66),
            KeyAction::release(66),
            KeyAction::press(77),
            KeyAction::release(77),
            KeyAction::press(78),
            KeyAction::release(78),
        ]);
        assert_eq!(out, expected);
        assert!(state.scroll_lock_state);
    }

    #[test]
    fn test_sync_scroll_lock_uses_tracked_state() {
        let mut state = KeyboardState {
            scroll_lock_state: true,
            scroll_lock_down: true,
            ..KeyboardState::default()
        };
        let mut out = Vec::new();
        synchronize(
            &mut state,
            SyncRequest::new(false, false, false),
            LockModifiers::default(),
            &mut out,
        );

        let mut expected = releases();
        expected.extend([KeyAction::press(78), KeyAction::release(78)]);
        assert_eq!(out, expected);
        assert!(!state.scroll_lock_state);
        assert!(!state.scroll_lock_down);
    }

    #[test]
    fn test_sync_uses_configured_keycodes() {
        let mut state = KeyboardState::new(crate::input::state::LockKeycodes {
            caps: 10,
            num: 11,
            scroll: 12,
        });
        let mut out = Vec::new();
        synchronize(
            &mut state,
            SyncRequest::new(true, false, false),
            LockModifiers::default(),
            &mut out,
        );
        assert_eq!(
            out,
            vec![
                KeyAction::release(10),
                KeyAction::release(11),
                KeyAction::release(12),
                KeyAction::press(10),
                KeyAction::release(10),
            ]
        );
    }
}
