//! Error types for the Windowgate service.

use thiserror::Error;

/// Main error type for Windowgate operations.
///
/// Denied admissions are not errors; they are reported through
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum WindowGateError {
    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failures reading or merging configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Windowgate operations.
pub type Result<T> = std::result::Result<T, WindowGateError>;
