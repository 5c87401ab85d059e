//! RDP Keyboard Device
//!
//! Per-device coordinator. Owns the [`KeyboardState`], routes protocol input
//! to the normalizer, the lock synchronizer or the layout resolver, posts the
//! resulting actions to the host in order, and keeps the deferred
//! auto-repeat-off queue for the device.
//!
//! # Lifecycle
//!
//! ```text
//! attach ─> handle* / keyboard_control_changed* / run_deferred* ─> detach
//! ```
//!
//! Everything runs on the caller's thread. Nothing here blocks.

use crate::config::types::KeyboardConfig;
use crate::input::error::{recovery_action, KeyboardError, Result};
use crate::input::host::{DeviceId, DeviceRegistry, KeyAction, KeyboardHost};
use crate::input::layout::{LayoutDescriptor, LayoutOverride, LayoutResolver};
use crate::input::normalizer::{normalize, Disposition, DropReason, KeyEvent};
use crate::input::repeat::DeferredRepeatOff;
use crate::input::state::{KeyboardState, LockKeycodes};
use crate::input::sync::{synchronize, SyncRequest};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Host message: key pressed
pub const MSG_KEY_DOWN: i32 = 15;
/// Host message: key released
pub const MSG_KEY_UP: i32 = 16;
/// Host message: lock state synchronization
pub const MSG_SYNCHRONIZE: i32 = 17;
/// Host message: client keyboard layout
pub const MSG_LAYOUT: i32 = 18;

/// Input routed to an [`RdpKeyboard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardInput {
    /// TS_KEYBOARD_EVENT with its local keycode
    Key(KeyEvent),
    /// TS_SYNC_EVENT
    Sync(SyncRequest),
    /// Client layout record, `None` for the built-in defaults
    LayoutChange(Option<LayoutOverride>),
}

impl KeyboardInput {
    /// Decode a numeric host message
    ///
    /// For key messages `param1` is the local keycode, `param3` the protocol
    /// keyCode and `param4` the protocol keyboardFlags. For sync messages
    /// `param1` carries the toggle flags. Layout messages carry a record
    /// rather than integers and are built as [`KeyboardInput::LayoutChange`]
    /// directly.
    pub fn from_message(msg: i32, param1: i64, param3: i64, param4: i64) -> Result<Self> {
        match msg {
            MSG_KEY_DOWN | MSG_KEY_UP => Ok(KeyboardInput::Key(KeyEvent {
                down: msg == MSG_KEY_DOWN,
                local_keycode: u32::try_from(param1).unwrap_or(0),
                protocol_keycode: (param3 & 0xFFFF) as u16,
                protocol_flags: (param4 & 0xFFFF) as u16,
            })),
            MSG_SYNCHRONIZE => Ok(KeyboardInput::Sync(SyncRequest::from_flags(
                (param1 & 0xFFFF_FFFF) as u32,
            ))),
            other => {
                debug!("Ignoring input message {}", other);
                Err(KeyboardError::UnknownMessage(other))
            }
        }
    }
}

/// Keyboard statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardStats {
    /// Key events received
    pub key_events: u64,
    /// Actions posted to the host
    pub actions_emitted: u64,
    /// Key events dropped for lack of a local keycode
    pub unmapped_drops: u64,
    /// Numlock halves of pause sequences dropped
    pub skipped_numlock: u64,
    /// Tab releases dropped as sync artifacts
    pub tab_artifacts: u64,
    /// Sync requests handled
    pub sync_requests: u64,
    /// Layout loads that succeeded
    pub layout_reloads: u64,
    /// Layout loads that failed
    pub layout_failures: u64,
}

/// One attached RDP keyboard
#[derive(Debug)]
pub struct RdpKeyboard {
    device: DeviceId,
    state: KeyboardState,
    resolver: LayoutResolver,
    repeat: DeferredRepeatOff,
    stats: KeyboardStats,
    layout: Option<LayoutDescriptor>,
}

impl RdpKeyboard {
    /// Attach a keyboard and load the built-in layout
    ///
    /// A layout failure is logged; the keyboard is attached regardless.
    pub fn attach<H, R>(
        device: DeviceId,
        config: &KeyboardConfig,
        host: &mut H,
        registry: &R,
    ) -> Self
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        info!("Attaching RDP keyboard {}", device);

        let mut keyboard = Self {
            device,
            state: KeyboardState::new(config.lock_keycodes()),
            resolver: LayoutResolver::from_config(config),
            repeat: DeferredRepeatOff::new(config.auto_repeat_off_delay()),
            stats: KeyboardStats::default(),
            layout: None,
        };

        if let Err(e) = keyboard.load_layout(None, host, registry) {
            warn!("Default layout not loaded on attach: {}", e);
        }

        keyboard
    }

    /// Device handle
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Translation state
    pub fn state(&self) -> &KeyboardState {
        &self.state
    }

    /// Statistics
    pub fn stats(&self) -> KeyboardStats {
        self.stats
    }

    /// Configured lock keycodes
    pub fn default_lock_keycodes(&self) -> LockKeycodes {
        self.resolver.default_lock_keycodes()
    }

    /// Descriptor of the last successful layout load
    pub fn layout(&self) -> Option<&LayoutDescriptor> {
        self.layout.as_ref()
    }

    /// Pending auto-repeat-off tasks
    pub fn deferred(&self) -> &DeferredRepeatOff {
        &self.repeat
    }

    /// Route one input, returning the actions posted to the host
    ///
    /// Only layout changes can fail.
    pub fn handle<H, R>(
        &mut self,
        input: KeyboardInput,
        host: &mut H,
        registry: &R,
    ) -> Result<Vec<KeyAction>>
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        match input {
            KeyboardInput::Key(event) => Ok(self.handle_key(&event, host)),
            KeyboardInput::Sync(request) => Ok(self.synchronize(request, host)),
            KeyboardInput::LayoutChange(client) => self
                .load_layout(client.as_ref(), host, registry)
                .map(|_| Vec::new()),
        }
    }

    /// Normalize a key event and post the result
    pub fn handle_key<H>(&mut self, event: &KeyEvent, host: &mut H) -> Vec<KeyAction>
    where
        H: KeyboardHost + ?Sized,
    {
        self.stats.key_events += 1;

        let mut actions = Vec::with_capacity(2);
        match normalize(&mut self.state, event, &mut actions) {
            Disposition::Dropped(DropReason::Unmapped) => self.stats.unmapped_drops += 1,
            Disposition::Dropped(DropReason::PauseNumLock) => self.stats.skipped_numlock += 1,
            Disposition::Dropped(DropReason::TabArtifact) => self.stats.tab_artifacts += 1,
            Disposition::Forwarded | Disposition::Normalized => {}
        }

        self.post(&actions, host);
        actions
    }

    /// Reconcile lock keys with a client sync request
    pub fn synchronize<H>(&mut self, request: SyncRequest, host: &mut H) -> Vec<KeyAction>
    where
        H: KeyboardHost + ?Sized,
    {
        self.stats.sync_requests += 1;

        let current = host.lock_modifiers(self.device);
        let mut actions = Vec::with_capacity(9);
        synchronize(&mut self.state, request, current, &mut actions);

        self.post(&actions, host);
        actions
    }

    /// Resolve a client layout record and reinstall keymaps
    pub fn load_layout<H, R>(
        &mut self,
        client: Option<&LayoutOverride>,
        host: &mut H,
        registry: &R,
    ) -> Result<()>
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        self.layout = None;
        match self
            .resolver
            .load(&mut self.state, self.device, client, host, registry)
        {
            Ok(descriptor) => {
                info!("Keyboard layout active on {}: {}", self.device, descriptor);
                self.stats.layout_reloads += 1;
                self.layout = Some(descriptor);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Keyboard layout load failed on {}: {} (recovery: {:?})",
                    self.device,
                    e,
                    recovery_action(&e)
                );
                self.stats.layout_failures += 1;
                Err(e)
            }
        }
    }

    /// React to a keyboard control change on `device`
    ///
    /// Switching auto-repeat on schedules it to be switched off again after
    /// the configured delay. Returns the deadline when one was scheduled.
    pub fn keyboard_control_changed(
        &mut self,
        device: DeviceId,
        repeat_enabled: bool,
        now: Instant,
    ) -> Option<Instant> {
        if !repeat_enabled {
            debug!("Auto-repeat disabled on {}, nothing to do", device);
            return None;
        }
        Some(self.repeat.schedule(device, now))
    }

    /// Fire due deferred tasks
    pub fn run_deferred<H, R>(&mut self, now: Instant, host: &mut H, registry: &R) -> Vec<DeviceId>
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        self.repeat.run_due(now, host, registry)
    }

    /// Detach the keyboard, cancelling pending deferred tasks
    ///
    /// Returns the final statistics.
    pub fn detach(mut self) -> KeyboardStats {
        let cancelled = self.repeat.cancel_all();
        info!(
            "Detached RDP keyboard {} ({} deferred task(s) cancelled)",
            self.device, cancelled
        );
        self.stats
    }

    fn post<H>(&mut self, actions: &[KeyAction], host: &mut H)
    where
        H: KeyboardHost + ?Sized,
    {
        for action in actions {
            trace!("{} -> {}", self.device, action);
            host.post_key(self.device, *action);
        }
        self.stats.actions_emitted += actions.len() as u64;
    }
}
