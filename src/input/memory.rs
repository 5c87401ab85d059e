//! In-Memory Input Subsystem
//!
//! [`MemoryHost`] records every side effect and models just enough of a
//! local input stack to answer lock-state queries: pressing a device's
//! lock keycode toggles the corresponding lock. Releasing a keymap drops
//! the device's key and lock state with it. [`MemoryRegistry`] is a plain
//! device list.
//!
//! Used by the replay tool's `memory` backend and by the tests.

use crate::input::error::{KeyboardError, Result};
use crate::input::host::{
    DeviceId, DeviceRegistry, KeyAction, KeyboardHost, KeymapInfo, LockModifiers,
};
use crate::input::layout::LayoutDescriptor;
use crate::input::state::LockKeycodes;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Key range reported for every installed keymap
pub const MEMORY_KEYMAP: KeymapInfo = KeymapInfo {
    min_keycode: 8,
    max_keycode: 255,
};

/// Side effect recorded by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// `post_key`
    Key(DeviceId, KeyAction),
    /// `release_keymap`
    KeymapReleased(DeviceId),
    /// `install_keymap`, successful or not
    KeymapInstalled(DeviceId, LayoutDescriptor, bool),
    /// `apply_mapping_change`
    MappingChange(DeviceId, KeymapInfo),
    /// `set_auto_repeat`
    AutoRepeat(DeviceId, bool),
}

/// Recording [`KeyboardHost`]
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    events: Vec<HostEvent>,
    keymaps: HashMap<DeviceId, LayoutDescriptor>,
    locks: HashMap<DeviceId, LockModifiers>,
    pressed: HashSet<(DeviceId, u32)>,
    auto_repeat: HashMap<DeviceId, bool>,
    lock_keycodes: LockKeycodes,
    device_lock_keycodes: HashMap<DeviceId, LockKeycodes>,
    failing_layouts: HashSet<String>,
}

impl MemoryHost {
    /// Host whose keymaps put caps/num lock at the built-in keycodes until a
    /// device is told otherwise
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose keymaps put caps/num lock at `lock_keycodes` until a device
    /// is told otherwise
    pub fn with_lock_keycodes(lock_keycodes: LockKeycodes) -> Self {
        Self {
            lock_keycodes,
            ..Self::default()
        }
    }

    /// Make keymap compilation fail for `layout`
    pub fn fail_layout(&mut self, layout: impl Into<String>) {
        self.failing_layouts.insert(layout.into());
    }

    /// Preset the lock modifiers of `device`
    pub fn set_lock_modifiers(&mut self, device: DeviceId, mods: LockModifiers) {
        self.locks.insert(device, mods);
    }

    /// All recorded side effects
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Drain recorded side effects
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    /// Key actions posted to `device`, in order
    pub fn key_actions(&self, device: DeviceId) -> Vec<KeyAction> {
        self.events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Key(d, action) if *d == device => Some(*action),
                _ => None,
            })
            .collect()
    }

    /// Descriptor currently installed on `device`
    pub fn installed_keymap(&self, device: DeviceId) -> Option<&LayoutDescriptor> {
        self.keymaps.get(&device)
    }

    /// Auto-repeat control of `device` (on until told otherwise)
    pub fn auto_repeat(&self, device: DeviceId) -> bool {
        self.auto_repeat.get(&device).copied().unwrap_or(true)
    }

    /// Lock keycodes that toggle locks on `device`
    pub fn lock_keycodes_of(&self, device: DeviceId) -> LockKeycodes {
        self.device_lock_keycodes
            .get(&device)
            .copied()
            .unwrap_or(self.lock_keycodes)
    }

    /// Whether `keycode` is currently held on `device`
    pub fn is_pressed(&self, device: DeviceId, keycode: u32) -> bool {
        self.pressed.contains(&(device, keycode))
    }
}

impl KeyboardHost for MemoryHost {
    fn post_key(&mut self, device: DeviceId, action: KeyAction) {
        self.events.push(HostEvent::Key(device, action));

        if !action.down {
            self.pressed.remove(&(device, action.keycode));
            return;
        }

        // Lock keys toggle on the press edge only
        if !self.pressed.insert((device, action.keycode)) {
            return;
        }
        let keycodes = self.lock_keycodes_of(device);
        let locks = self.locks.entry(device).or_default();
        if action.keycode == keycodes.caps {
            locks.caps_lock = !locks.caps_lock;
        } else if action.keycode == keycodes.num {
            locks.num_lock = !locks.num_lock;
        }
    }

    fn lock_modifiers(&self, device: DeviceId) -> LockModifiers {
        self.locks.get(&device).copied().unwrap_or_default()
    }

    fn release_keymap(&mut self, device: DeviceId) {
        self.events.push(HostEvent::KeymapReleased(device));
        self.keymaps.remove(&device);
        self.locks.remove(&device);
        self.pressed.retain(|(d, _)| *d != device);
    }

    fn set_lock_keycodes(&mut self, device: DeviceId, keycodes: LockKeycodes) {
        self.device_lock_keycodes.insert(device, keycodes);
    }

    fn install_keymap(&mut self, device: DeviceId, descriptor: &LayoutDescriptor) -> Result<()> {
        let ok = !self.failing_layouts.contains(&descriptor.layout);
        self.events
            .push(HostEvent::KeymapInstalled(device, descriptor.clone(), ok));
        if !ok {
            return Err(KeyboardError::KeymapCompileFailed {
                descriptor: descriptor.to_string(),
            });
        }
        debug!("Installed keymap on {}: {}", device, descriptor);
        self.keymaps.insert(device, descriptor.clone());
        Ok(())
    }

    fn core_key_map(&self, device: DeviceId) -> Option<KeymapInfo> {
        self.keymaps.contains_key(&device).then_some(MEMORY_KEYMAP)
    }

    fn apply_mapping_change(&mut self, observer: DeviceId, map: &KeymapInfo) {
        self.events.push(HostEvent::MappingChange(observer, *map));
    }

    fn set_auto_repeat(&mut self, device: DeviceId, enabled: bool) {
        self.events.push(HostEvent::AutoRepeat(device, enabled));
        self.auto_repeat.insert(device, enabled);
    }
}

/// Registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Device handle
    pub id: DeviceId,
    /// Sends core events
    pub core_events: bool,
    /// Has key state
    pub has_keys: bool,
}

/// Plain device list implementing [`DeviceRegistry`]
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    core_keyboard: DeviceId,
    devices: Vec<DeviceEntry>,
}

impl MemoryRegistry {
    /// Registry holding only the core keyboard
    pub fn new(core_keyboard: DeviceId) -> Self {
        Self {
            core_keyboard,
            devices: vec![DeviceEntry {
                id: core_keyboard,
                core_events: true,
                has_keys: true,
            }],
        }
    }

    /// Register a device, replacing an existing entry with the same id
    pub fn register(&mut self, entry: DeviceEntry) {
        self.unregister(entry.id);
        self.devices.push(entry);
    }

    /// Register a key device that sends core events
    pub fn register_keyboard(&mut self, id: DeviceId) {
        self.register(DeviceEntry {
            id,
            core_events: true,
            has_keys: true,
        });
    }

    /// Remove a device; returns whether it was registered
    pub fn unregister(&mut self, id: DeviceId) -> bool {
        let before = self.devices.len();
        self.devices.retain(|entry| entry.id != id);
        self.devices.len() != before
    }

    /// Registered devices
    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn is_live(&self, device: DeviceId) -> bool {
        self.devices.iter().any(|entry| entry.id == device)
    }

    fn core_keyboard(&self) -> DeviceId {
        self.core_keyboard
    }

    fn mapping_observers(&self, device: DeviceId) -> Vec<DeviceId> {
        self.devices
            .iter()
            .filter(|entry| entry.has_keys && (entry.core_events || entry.id == device))
            .map(|entry| entry.id)
            .collect()
    }
}
