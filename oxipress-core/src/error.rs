//! Error types for OxiPress operations.
//!
//! Compression itself cannot fail on bad input (any byte sequence is a
//! valid input), so the error surface is small: invalid configuration at
//! stream creation, a stalled call that can make no progress, and internal
//! state violations that indicate a bug rather than bad data.

use std::io;
use thiserror::Error;

/// The main error type for OxiPress operations.
#[derive(Debug, Error)]
pub enum OxiPressError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid parameters at stream creation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the rejected parameter.
        message: String,
    },

    /// No progress is possible: the call would consume no input and
    /// produce no output. Non-fatal; the stream state is preserved and the
    /// caller may retry with more input or more output space.
    #[error("No progress possible: supply more input or more output space")]
    NoProgress,

    /// The stream was driven in a way that violates its state machine,
    /// or an internal invariant was broken. Treat as fatal.
    #[error("Invalid stream state: {message}")]
    InvalidState {
        /// Description of the violated state.
        message: String,
    },
}

/// Result type alias for OxiPress operations.
pub type Result<T> = std::result::Result<T, OxiPressError>;

impl OxiPressError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
