//! Layout Resolver
//!
//! Turns the client's keyboard layout advertisement into an RMLVO
//! descriptor (rules, model, layout, variant, options) and reinstalls the
//! keymap on every device that has to observe it.
//!
//! # Resolution
//!
//! Each string falls back to the built-in default when the client sent an
//! empty one. Lock keycodes are taken from the client record as a whole, or
//! from the built-in defaults when there is no record.
//!
//! # Reload
//!
//! ```text
//! release old keymap ─> compile + install ─> derive core map ─> notify observers
//! ```
//!
//! This runs once for the RDP keyboard and once for the process-wide core
//! keyboard. The old keymap is released before the new one is compiled, so
//! a compile failure leaves the device without a keymap until the next
//! successful load.

use crate::config::types::KeyboardConfig;
use crate::input::error::{KeyboardError, Result};
use crate::input::host::{DeviceId, DeviceRegistry, KeyboardHost, KeymapInfo};
use crate::input::state::{KeyboardState, LockKeycodes};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Built-in rules
pub const DEFAULT_RULES: &str = "evdev";
/// Built-in model
pub const DEFAULT_MODEL: &str = "pc104";
/// Built-in layout
pub const DEFAULT_LAYOUT: &str = "us";

/// RMLVO keymap descriptor handed to the keymap compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    /// XKB rules file
    pub rules: String,
    /// Keyboard model
    pub model: String,
    /// Layout list
    pub layout: String,
    /// Variant list
    pub variant: String,
    /// XKB options
    pub options: String,
}

impl Default for LayoutDescriptor {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_string(),
            model: DEFAULT_MODEL.to_string(),
            layout: DEFAULT_LAYOUT.to_string(),
            variant: String::new(),
            options: String::new(),
        }
    }
}

impl fmt::Display for LayoutDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rules=\"{}\" model=\"{}\" layout=\"{}\" variant=\"{}\" options=\"{}\"",
            self.rules, self.model, self.layout, self.variant, self.options
        )
    }
}

/// Layout information advertised by the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOverride {
    /// XKB rules, empty for default
    pub rules: String,
    /// Model, empty for default
    pub model: String,
    /// Layout, empty for default
    pub layout: String,
    /// Variant, empty for default
    pub variant: String,
    /// Options, empty for default
    pub options: String,
    /// Lock keycodes under the client's keymap
    pub lock_keycodes: LockKeycodes,
}

fn pick(client: &str, default: &str) -> String {
    if client.is_empty() {
        default.to_string()
    } else {
        client.to_string()
    }
}

/// Resolves client layout records and drives keymap reinstallation
#[derive(Debug, Clone, Default)]
pub struct LayoutResolver {
    defaults: LayoutDescriptor,
    default_lock_keycodes: LockKeycodes,
}

impl LayoutResolver {
    /// Create a resolver with explicit defaults
    pub fn new(defaults: LayoutDescriptor, default_lock_keycodes: LockKeycodes) -> Self {
        Self {
            defaults,
            default_lock_keycodes,
        }
    }

    /// Create a resolver from the keyboard configuration
    pub fn from_config(config: &KeyboardConfig) -> Self {
        Self::new(config.default_layout(), config.lock_keycodes())
    }

    /// Built-in descriptor
    pub fn defaults(&self) -> &LayoutDescriptor {
        &self.defaults
    }

    /// Lock keycodes used when the client sends no record
    pub fn default_lock_keycodes(&self) -> LockKeycodes {
        self.default_lock_keycodes
    }

    /// Resolve the descriptor and lock keycodes for a client record
    pub fn resolve(&self, client: Option<&LayoutOverride>) -> (LayoutDescriptor, LockKeycodes) {
        match client {
            Some(client) => {
                let descriptor = LayoutDescriptor {
                    rules: pick(&client.rules, &self.defaults.rules),
                    model: pick(&client.model, &self.defaults.model),
                    layout: pick(&client.layout, &self.defaults.layout),
                    variant: pick(&client.variant, &self.defaults.variant),
                    options: pick(&client.options, &self.defaults.options),
                };
                (descriptor, client.lock_keycodes)
            }
            None => (self.defaults.clone(), self.default_lock_keycodes),
        }
    }

    /// Resolve `client` and reinstall keymaps on `device` and the core keyboard
    ///
    /// Both reloads are attempted even if the first one fails. The first
    /// failure is returned.
    pub fn load<H, R>(
        &self,
        state: &mut KeyboardState,
        device: DeviceId,
        client: Option<&LayoutOverride>,
        host: &mut H,
        registry: &R,
    ) -> Result<LayoutDescriptor>
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        let (descriptor, lock_keycodes) = self.resolve(client);
        state.lock_keycodes = lock_keycodes;

        info!("Loading keyboard layout for {}: {}", device, descriptor);
        debug!("Lock keycodes: {:?}", lock_keycodes);

        let core = registry.core_keyboard();
        host.set_lock_keycodes(device, lock_keycodes);
        host.set_lock_keycodes(core, lock_keycodes);

        let device_result = reload_keymap(device, &descriptor, host, registry);
        let core_result = reload_keymap(core, &descriptor, host, registry);

        device_result.and(core_result).map(|_| descriptor)
    }
}

/// Tear down and reinstall the keymap of one device, then notify observers
pub fn reload_keymap<H, R>(
    device: DeviceId,
    descriptor: &LayoutDescriptor,
    host: &mut H,
    registry: &R,
) -> Result<KeymapInfo>
where
    H: KeyboardHost + ?Sized,
    R: DeviceRegistry + ?Sized,
{
    host.release_keymap(device);

    if let Err(e) = host.install_keymap(device, descriptor) {
        warn!("Keymap install failed on {}: {}", device, e);
        return Err(e);
    }

    let Some(map) = host.core_key_map(device) else {
        warn!("Keymap installed on {} but no core map is available", device);
        return Err(KeyboardError::CoreMapUnavailable(device));
    };

    for observer in registry.mapping_observers(device) {
        debug!(
            "Mapping change -> {}: keys {}..{} ({})",
            observer,
            map.min_keycode,
            map.max_keycode,
            map.num_keys()
        );
        host.apply_mapping_change(observer, &map);
    }

    Ok(map)
}
