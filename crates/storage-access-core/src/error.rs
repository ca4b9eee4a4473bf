//! Error types for the core taxonomy.

use thiserror::Error;

/// Errors raised while building core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("origin has no host: {0}")]
    MissingHost(String),

    #[error("unknown behavior mode: {0}")]
    UnknownBehavior(i32),

    #[error("unknown allow mode: {0}")]
    UnknownAllowMode(i32),

    #[error("unknown capability: {0}")]
    UnknownCapability(u32),

    #[error("unknown expiry kind: {0}")]
    UnknownExpiryKind(u32),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
