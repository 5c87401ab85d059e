//! libxkbcommon Input Subsystem
//!
//! A [`KeyboardHost`] that compiles real keymaps from RMLVO names and keeps
//! an `xkb::State` per device, so lock-state queries reflect what the
//! injected key stream actually did to the keymap.
//!
//! Keycodes are X11/XKB keycodes (evdev + 8), the same numbering the
//! translation core uses.

use crate::input::error::{KeyboardError, Result};
use crate::input::host::{DeviceId, KeyAction, KeyboardHost, KeymapInfo, LockModifiers};
use crate::input::layout::LayoutDescriptor;
use std::collections::HashMap;
use tracing::{debug, trace, warn};
use xkbcommon::xkb;

struct XkbDevice {
    keymap: xkb::Keymap,
    state: xkb::State,
}

/// [`KeyboardHost`] backed by libxkbcommon
pub struct XkbHost {
    context: xkb::Context,
    devices: HashMap<DeviceId, XkbDevice>,
    actions: Vec<(DeviceId, KeyAction)>,
    mapping_changes: Vec<(DeviceId, KeymapInfo)>,
    auto_repeat: HashMap<DeviceId, bool>,
}

impl XkbHost {
    /// Create a host with a fresh XKB context
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            devices: HashMap::new(),
            actions: Vec::new(),
            mapping_changes: Vec::new(),
            auto_repeat: HashMap::new(),
        }
    }

    /// Key actions posted so far
    pub fn actions(&self) -> &[(DeviceId, KeyAction)] {
        &self.actions
    }

    /// Mapping change notifications delivered so far
    pub fn mapping_changes(&self) -> &[(DeviceId, KeymapInfo)] {
        &self.mapping_changes
    }

    /// Auto-repeat control of `device`
    pub fn auto_repeat(&self, device: DeviceId) -> bool {
        self.auto_repeat.get(&device).copied().unwrap_or(true)
    }

    /// Keymap of `device` in XKB v1 text format
    pub fn keymap_text(&self, device: DeviceId) -> Option<String> {
        self.devices
            .get(&device)
            .map(|dev| dev.keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1))
    }

    fn compile(&self, descriptor: &LayoutDescriptor) -> Result<xkb::Keymap> {
        let options = (!descriptor.options.is_empty()).then(|| descriptor.options.clone());
        xkb::Keymap::new_from_names(
            &self.context,
            descriptor.rules.as_str(),
            descriptor.model.as_str(),
            descriptor.layout.as_str(),
            descriptor.variant.as_str(),
            options,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| KeyboardError::KeymapCompileFailed {
            descriptor: descriptor.to_string(),
        })
    }
}

impl Default for XkbHost {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardHost for XkbHost {
    fn post_key(&mut self, device: DeviceId, action: KeyAction) {
        self.actions.push((device, action));

        let Some(dev) = self.devices.get_mut(&device) else {
            trace!("No keymap on {}, key {} not applied", device, action);
            return;
        };
        let direction = if action.down {
            xkb::KeyDirection::Down
        } else {
            xkb::KeyDirection::Up
        };
        dev.state
            .update_key(xkb::Keycode::new(action.keycode), direction);
    }

    fn lock_modifiers(&self, device: DeviceId) -> LockModifiers {
        self.devices
            .get(&device)
            .map(|dev| {
                LockModifiers::from_state_field(dev.state.serialize_mods(xkb::STATE_MODS_EFFECTIVE))
            })
            .unwrap_or_default()
    }

    fn release_keymap(&mut self, device: DeviceId) {
        if self.devices.remove(&device).is_some() {
            debug!("Released keymap of {}", device);
        }
    }

    fn install_keymap(&mut self, device: DeviceId, descriptor: &LayoutDescriptor) -> Result<()> {
        let keymap = self.compile(descriptor).map_err(|e| {
            warn!("XKB rejected {}", descriptor);
            e
        })?;
        let state = xkb::State::new(&keymap);
        debug!(
            "Compiled keymap for {}: keycodes {}..{}",
            device,
            keymap.min_keycode().raw(),
            keymap.max_keycode().raw()
        );
        self.devices.insert(device, XkbDevice { keymap, state });
        Ok(())
    }

    fn core_key_map(&self, device: DeviceId) -> Option<KeymapInfo> {
        self.devices.get(&device).map(|dev| KeymapInfo {
            min_keycode: dev.keymap.min_keycode().raw(),
            max_keycode: dev.keymap.max_keycode().raw(),
        })
    }

    fn apply_mapping_change(&mut self, observer: DeviceId, map: &KeymapInfo) {
        self.mapping_changes.push((observer, *map));
    }

    fn set_auto_repeat(&mut self, device: DeviceId, enabled: bool) {
        self.auto_repeat.insert(device, enabled);
    }
}
