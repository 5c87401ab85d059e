//! Configuration type definitions

use crate::input::layout::{LayoutDescriptor, DEFAULT_LAYOUT, DEFAULT_MODEL, DEFAULT_RULES};
use crate::input::state::{
    LockKeycodes, CAPS_LOCK_KEYCODE, NUM_LOCK_KEYCODE, SCROLL_LOCK_KEYCODE,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Keyboard translation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardConfig {
    /// XKB rules used when the client sends none
    #[serde(default = "default_rules")]
    pub rules: String,

    /// Keyboard model used when the client sends none
    #[serde(default = "default_model")]
    pub model: String,

    /// Layout used when the client sends none
    #[serde(default = "default_layout")]
    pub layout: String,

    /// Variant used when the client sends none
    #[serde(default)]
    pub variant: String,

    /// XKB options used when the client sends none
    #[serde(default)]
    pub options: String,

    /// Caps Lock keycode used when the client sends no layout record
    #[serde(default = "default_caps_lock_keycode")]
    pub caps_lock_keycode: u32,

    /// Num Lock keycode used when the client sends no layout record
    #[serde(default = "default_num_lock_keycode")]
    pub num_lock_keycode: u32,

    /// Scroll Lock keycode used when the client sends no layout record
    #[serde(default = "default_scroll_lock_keycode")]
    pub scroll_lock_keycode: u32,

    /// Milliseconds auto-repeat stays on after a client enables it
    #[serde(default = "default_auto_repeat_off_delay_ms")]
    pub auto_repeat_off_delay_ms: u64,
}

fn default_rules() -> String {
    DEFAULT_RULES.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_layout() -> String {
    DEFAULT_LAYOUT.to_string()
}
fn default_caps_lock_keycode() -> u32 {
    CAPS_LOCK_KEYCODE
}
fn default_num_lock_keycode() -> u32 {
    NUM_LOCK_KEYCODE
}
fn default_scroll_lock_keycode() -> u32 {
    SCROLL_LOCK_KEYCODE
}
fn default_auto_repeat_off_delay_ms() -> u64 {
    100
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            model: default_model(),
            layout: default_layout(),
            variant: String::new(),
            options: String::new(),
            caps_lock_keycode: default_caps_lock_keycode(),
            num_lock_keycode: default_num_lock_keycode(),
            scroll_lock_keycode: default_scroll_lock_keycode(),
            auto_repeat_off_delay_ms: default_auto_repeat_off_delay_ms(),
        }
    }
}

impl KeyboardConfig {
    /// Built-in layout descriptor
    pub fn default_layout(&self) -> LayoutDescriptor {
        LayoutDescriptor {
            rules: self.rules.clone(),
            model: self.model.clone(),
            layout: self.layout.clone(),
            variant: self.variant.clone(),
            options: self.options.clone(),
        }
    }

    /// Built-in lock keycodes
    pub fn lock_keycodes(&self) -> LockKeycodes {
        LockKeycodes {
            caps: self.caps_lock_keycode,
            num: self.num_lock_keycode,
            scroll: self.scroll_lock_keycode,
        }
    }

    /// Auto-repeat-off delay
    pub fn auto_repeat_off_delay(&self) -> Duration {
        Duration::from_millis(self.auto_repeat_off_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_level")]
    pub level: String,

    /// Log format ("pretty", "compact", "json")
    #[serde(default = "default_format")]
    pub format: String,

    /// Directory for log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}
fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            log_dir: None,
        }
    }
}
