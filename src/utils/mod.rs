//! Utility Functions
//!
//! User-friendly error formatting for the command line.
//!
//! ```rust
//! use lamco_rdp_keyboard::utils::format_user_error;
//!
//! let error = anyhow::anyhow!("Failed to read config file: /etc/missing.toml");
//! let text = format_user_error(&error);
//! assert!(text.contains("Configuration Error"));
//! ```

pub mod errors;

pub use errors::format_user_error;
