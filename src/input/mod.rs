//! Keyboard Input Translation
//!
//! Translates the RDP keyboard event stream into the key semantics a local
//! input subsystem expects: release-then-press repeats, debounced scroll
//! lock, pause sequences without their numlock half, lock state converged to
//! what the client asks for, and keymaps compiled from the client layout.
//!
//! # Architecture
//!
//! ```text
//! RDP Keyboard Input (key / sync / layout)
//!       ↓
//! ┌─────────────────────────┐
//! │  RdpKeyboard            │ ← Per-device coordinator
//! │  - Input routing        │
//! │  - Statistics tracking  │
//! └─────────────────────────┘
//!       ↓            ↓            ↓
//! ┌────────────┐ ┌──────────┐ ┌──────────┐
//! │ Normalizer │ │   Sync   │ │  Layout  │
//! │ (classify) │ │          │ │ Resolver │
//! └────────────┘ └──────────┘ └──────────┘
//!       ↓            ↓            ↓
//! KeyboardHost (post_key, lock_modifiers, install_keymap, ...)
//! ```
//!
//! # Usage Example
//!
//! ```rust
//! use lamco_rdp_keyboard::config::KeyboardConfig;
//! use lamco_rdp_keyboard::input::{
//!     DeviceId, KeyAction, KeyboardInput, MemoryHost, MemoryRegistry, RdpKeyboard,
//! };
//!
//! let mut host = MemoryHost::new();
//! let mut registry = MemoryRegistry::new(DeviceId(1));
//! registry.register_keyboard(DeviceId(2));
//!
//! let mut keyboard =
//!     RdpKeyboard::attach(DeviceId(2), &KeyboardConfig::default(), &mut host, &registry);
//!
//! // 'A' pressed: keycode 38, scancode 0x1E
//! let input = KeyboardInput::from_message(15, 38, 0x1E, 0).unwrap();
//! let actions = keyboard.handle(input, &mut host, &registry).unwrap();
//! assert_eq!(actions, vec![KeyAction::release(38), KeyAction::press(38)]);
//! ```

pub mod device;
pub mod error;
pub mod host;
pub mod keymap;
pub mod layout;
pub mod memory;
pub mod normalizer;
pub mod repeat;
pub mod scancode;
pub mod state;
pub mod sync;
#[cfg(feature = "xkb")]
pub mod xkb;

pub use device::{KeyboardInput, KeyboardStats, RdpKeyboard};
pub use error::{ErrorType, KeyboardError, RecoveryAction, Result};
pub use host::{DeviceId, DeviceRegistry, KeyAction, KeyboardHost, KeymapInfo, LockModifiers};
pub use keymap::{KeycodeLookup, X11Keycodes};
pub use layout::{LayoutDescriptor, LayoutOverride, LayoutResolver};
pub use memory::{HostEvent, MemoryHost, MemoryRegistry};
pub use normalizer::{normalize, Disposition, DropReason, KeyEvent};
pub use repeat::DeferredRepeatOff;
pub use scancode::{classify, KeyCategory, Scancode};
pub use state::{KeyboardState, LockKeycodes};
pub use sync::{synchronize, SyncRequest};
#[cfg(feature = "xkb")]
pub use xkb::XkbHost;
