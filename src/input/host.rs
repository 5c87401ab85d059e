//! Host Input Subsystem Interface
//!
//! The translation core never touches the local input stack directly. Every
//! side effect goes through [`KeyboardHost`], and every question about which
//! devices exist goes through [`DeviceRegistry`]. Implementations are picked
//! once at start-up (see [`crate::input::memory`] and `crate::input::xkb`).

use crate::input::error::Result;
use crate::input::layout::LayoutDescriptor;
use crate::input::state::LockKeycodes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for a device registered with the local input subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// One key injection for the local subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAction {
    /// Press (true) or release (false)
    pub down: bool,
    /// Local keycode
    pub keycode: u32,
}

impl KeyAction {
    /// Key press action
    pub const fn press(keycode: u32) -> Self {
        Self {
            down: true,
            keycode,
        }
    }

    /// Key release action
    pub const fn release(keycode: u32) -> Self {
        Self {
            down: false,
            keycode,
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.down { "down" } else { "up" };
        write!(f, "{} {}", dir, self.keycode)
    }
}

/// Lock modifier bits owned by the local subsystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockModifiers {
    /// Caps Lock active
    pub caps_lock: bool,
    /// Num Lock active
    pub num_lock: bool,
}

impl LockModifiers {
    /// Core protocol `LockMask`
    pub const LOCK_MASK: u32 = 1 << 1;
    /// Core protocol `Mod2Mask` (Num Lock on standard keymaps)
    pub const MOD2_MASK: u32 = 1 << 4;

    /// Decode a core-protocol modifier state field
    pub fn from_state_field(field: u32) -> Self {
        Self {
            caps_lock: field & Self::LOCK_MASK != 0,
            num_lock: field & Self::MOD2_MASK != 0,
        }
    }

    /// Encode as a core-protocol modifier state field
    pub fn to_state_field(self) -> u32 {
        let mut field = 0;
        if self.caps_lock {
            field |= Self::LOCK_MASK;
        }
        if self.num_lock {
            field |= Self::MOD2_MASK;
        }
        field
    }
}

/// Key range of an installed core key map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeymapInfo {
    /// Lowest keycode in the map
    pub min_keycode: u32,
    /// Highest keycode in the map
    pub max_keycode: u32,
}

impl KeymapInfo {
    /// Number of keys covered by the map
    pub fn num_keys(&self) -> u32 {
        self.max_keycode.saturating_sub(self.min_keycode) + 1
    }
}

/// Side effects on the local input subsystem
#[cfg_attr(test, mockall::automock)]
pub trait KeyboardHost {
    /// Inject a key transition on `device`
    fn post_key(&mut self, device: DeviceId, action: KeyAction);

    /// Read the authoritative lock modifiers of `device`
    fn lock_modifiers(&self, device: DeviceId) -> LockModifiers;

    /// Free the compiled keymap and key state of `device`, if any
    fn release_keymap(&mut self, device: DeviceId);

    /// Compile `descriptor` and install the result on `device`
    fn install_keymap(&mut self, device: DeviceId, descriptor: &LayoutDescriptor) -> Result<()>;

    /// Tell the host where caps/num/scroll lock sit under the client keymap
    ///
    /// Hosts that read the lock keys from the compiled keymap ignore this.
    fn set_lock_keycodes(&mut self, _device: DeviceId, _keycodes: LockKeycodes) {}

    /// Core key map of `device` after a successful install
    fn core_key_map(&self, device: DeviceId) -> Option<KeymapInfo>;

    /// Tell `observer` (and its clients) that the key mapping changed
    fn apply_mapping_change(&mut self, observer: DeviceId, map: &KeymapInfo);

    /// Toggle the auto-repeat control of `device`
    fn set_auto_repeat(&mut self, device: DeviceId, enabled: bool);
}

/// Read-only view of the host's device list
#[cfg_attr(test, mockall::automock)]
pub trait DeviceRegistry {
    /// Whether `device` is still registered
    fn is_live(&self, device: DeviceId) -> bool;

    /// Process-wide default keyboard
    fn core_keyboard(&self) -> DeviceId;

    /// Devices with key state that send core events or are `device` itself
    fn mapping_observers(&self, device: DeviceId) -> Vec<DeviceId>;
}
