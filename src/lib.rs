//! # lamco-rdp-keyboard
//!
//! RDP keyboard translation core: scancode classification, repeat
//! normalization, lock state synchronization and layout-driven keymap
//! reinstallation.
//!
//! # Architecture
//!
//! ```text
//! lamco-rdp-keyboard
//!   ├─> RdpKeyboard (per-device state, input routing)
//!   │     ├─> Normalizer (key events)
//!   │     ├─> Synchronizer (TS_SYNC_EVENT)
//!   │     └─> Layout Resolver (client layout -> RMLVO keymap)
//!   ├─> KeyboardHost / DeviceRegistry (local input subsystem seam)
//!   └─> Replay (JSON-lines trace runner behind the CLI)
//! ```
//!
//! # Data Flow
//!
//! **Key Path:** Client → TS_KEYBOARD_EVENT → Normalizer → KeyboardHost::post_key
//!
//! **Sync Path:** Client → TS_SYNC_EVENT → Synchronizer (reads host lock state) → post_key
//!
//! **Layout Path:** Client layout → Resolver → install_keymap → mapping change broadcast

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Configuration
pub mod config;

/// Keyboard translation
pub mod input;

/// Trace replay
pub mod replay;

/// Utility functions
pub mod utils;
