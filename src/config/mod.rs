//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod types;

pub use crate::input::state::{MAX_KEYCODE, MIN_KEYCODE};
pub use types::{KeyboardConfig, LoggingConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Keyboard translation configuration
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let kbd = &self.keyboard;

        for (name, value) in [
            ("rules", &kbd.rules),
            ("model", &kbd.model),
            ("layout", &kbd.layout),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Default keyboard {} must not be empty", name);
            }
        }

        let keycodes = kbd.lock_keycodes();
        keycodes
            .validate()
            .context("Invalid lock keycode in [keyboard] config")?;

        if keycodes.caps == keycodes.num
            || keycodes.caps == keycodes.scroll
            || keycodes.num == keycodes.scroll
        {
            anyhow::bail!("Lock keycodes must be distinct: {:?}", keycodes);
        }

        if kbd.auto_repeat_off_delay_ms == 0 {
            anyhow::bail!("auto_repeat_off_delay_ms must be greater than 0");
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Override the built-in layout with CLI arguments
    pub fn with_overrides(mut self, layout: Option<String>, variant: Option<String>) -> Self {
        if let Some(layout) = layout {
            self.keyboard.layout = layout;
        }
        if let Some(variant) = variant {
            self.keyboard.variant = variant;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyboardError;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default_config().unwrap();
        assert_eq!(config.keyboard.rules, "evdev");
        assert_eq!(config.keyboard.model, "pc104");
        assert_eq!(config.keyboard.layout, "us");
        assert_eq!(config.keyboard.lock_keycodes().all(), [66, 77, 78]);
        assert_eq!(config.keyboard.auto_repeat_off_delay_ms, 100);
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[keyboard]\nlayout = \"de\"\nvariant = \"nodeadkeys\"\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.keyboard.layout, "de");
        assert_eq!(config.keyboard.variant, "nodeadkeys");
        assert_eq!(config.keyboard.rules, "evdev");
        assert_eq!(config.keyboard.caps_lock_keycode, 66);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/lamco-rdp-keyboard.toml").is_err());
    }

    #[test]
    fn test_validation_empty_layout() {
        let mut config = Config::default();
        config.keyboard.layout = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_keycode_range() {
        let mut config = Config::default();
        config.keyboard.scroll_lock_keycode = 300;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KeyboardError>(),
            Some(KeyboardError::InvalidKeycode(300))
        ));

        config.keyboard.scroll_lock_keycode = MIN_KEYCODE - 1;
        assert!(config.validate().is_err());

        config.keyboard.scroll_lock_keycode = MAX_KEYCODE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_duplicate_keycodes() {
        let mut config = Config::default();
        config.keyboard.num_lock_keycode = config.keyboard.caps_lock_keycode;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_delay() {
        let mut config = Config::default();
        config.keyboard.auto_repeat_off_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = Config::default().with_overrides(Some("fr".to_string()), None);
        assert_eq!(config.keyboard.layout, "fr");
        assert_eq!(config.keyboard.variant, "");
    }
}
