//! Error types for the engine.

use storage_access_core::GrantReason;
use storage_access_ipc::IpcError;
use storage_access_store::StoreError;
use thiserror::Error;

/// Why a storage-access grant request was rejected.
///
/// Every variant is terminal for the request. Nothing is written for any
/// variant raised before the commit step.
#[derive(Debug, Error)]
pub enum GrantError {
    /// A window, document or top-context link could not be resolved.
    #[error("could not resolve {0}")]
    ContextResolution(&'static str),

    /// The heuristic behind this reason is disabled.
    #[error("grants for {0:?} are disabled")]
    PolicyGate(GrantReason),

    /// The parent window is not the kind of third party the mode grants to.
    #[error("parent window is not a qualifying third party")]
    NotThirdParty,

    /// The parent document is sandboxed without storage access.
    #[error("parent document is sandboxed")]
    Sandboxed,

    /// The tracking origin needs prior user interaction and has none.
    #[error("{origin} has not been interacted with")]
    InteractionRequired { origin: String },

    /// The caller-supplied final check failed.
    #[error("final check rejected the grant")]
    FinalCheckRejected,

    /// The durable write failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The cross-process commit failed.
    #[error("transport error: {0}")]
    Transport(#[from] IpcError),

    /// An auto-grant could not be bounded by its expiry observer.
    #[error("no runtime to enforce the auto-grant lifetime")]
    ExpiryUnavailable,

    /// A commit request was missing required input.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),
}

/// Errors raised while setting up the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration parsed but is unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Grant error.
    #[error("grant error: {0}")]
    Grant(#[from] GrantError),
}

/// Result type for engine setup.
pub type Result<T> = std::result::Result<T, EngineError>;
