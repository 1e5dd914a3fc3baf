//! Top-level error taxonomy for the bridge.
//!
//! Each stage keeps its own error enum; this type is the roll-up surfaced
//! to the operator at process level.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("authentication failure: {0}")]
    Authentication(#[from] crate::auth::AuthError),

    #[error("broker session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
