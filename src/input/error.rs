//! Keyboard Bridge Error Types
//!
//! Error handling for the keyboard translation core. None of these errors is
//! fatal to the process: the worst case is that a requested layout does not
//! take effect until the next layout change.

use crate::input::host::DeviceId;
use thiserror::Error;

/// Result type for keyboard operations
pub type Result<T> = std::result::Result<T, KeyboardError>;

/// Keyboard module error types
#[derive(Error, Debug)]
pub enum KeyboardError {
    /// The external keymap compiler rejected the descriptor
    #[error("Keymap compilation failed for {descriptor}")]
    KeymapCompileFailed {
        /// Human readable RMLVO descriptor
        descriptor: String,
    },

    /// Keymap installed but no core key map could be derived from it
    #[error("No core key map available for device {0}")]
    CoreMapUnavailable(DeviceId),

    /// Lock keycode outside the core protocol keycode range
    #[error("Invalid lock keycode: {0} (must be 8..=255)")]
    InvalidKeycode(u32),

    /// Host input message code not handled by the keyboard
    #[error("Unknown input message: {0}")]
    UnknownMessage(i32),

    /// Malformed replay trace line
    #[error("Invalid trace event at line {line}: {reason}")]
    InvalidTrace {
        /// 1-based line number
        line: usize,
        /// Parser message
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classification for recovery strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Keymap compile/install errors
    Layout,
    /// Malformed input from the protocol side
    Protocol,
    /// IO errors
    Io,
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &KeyboardError) -> ErrorType {
    match error {
        KeyboardError::KeymapCompileFailed { .. } | KeyboardError::CoreMapUnavailable(_) => {
            ErrorType::Layout
        }

        KeyboardError::InvalidKeycode(_)
        | KeyboardError::UnknownMessage(_)
        | KeyboardError::InvalidTrace { .. } => ErrorType::Protocol,

        KeyboardError::Io(_) => ErrorType::Io,
    }
}

/// Recovery action to take after error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Leave the device as it is until the client renegotiates its layout.
    /// The previous keymap is already gone at this point.
    AwaitLayoutChange,

    /// Skip this event
    Skip,

    /// Fail and propagate error
    Fail,
}

/// Determine recovery action for error
pub fn recovery_action(error: &KeyboardError) -> RecoveryAction {
    match classify_error(error) {
        ErrorType::Layout => RecoveryAction::AwaitLayoutChange,
        ErrorType::Protocol => RecoveryAction::Skip,
        ErrorType::Io => RecoveryAction::Fail,
    }
}
