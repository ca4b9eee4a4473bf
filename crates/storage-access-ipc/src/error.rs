//! Error types for the grant request protocol.

use thiserror::Error;

use crate::messages::{ReplyStatus, RequestId};

/// Errors that can occur while exchanging grant requests.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The peer went away, or dropped the request without replying.
    #[error("channel closed")]
    ChannelClosed,

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Protocol version mismatch with the peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// A frame of the wrong kind arrived.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// A reply answered a different request.
    #[error("reply for {actual:?} while waiting for {expected:?}")]
    RequestMismatch {
        expected: RequestId,
        actual: RequestId,
    },

    /// The privileged coordinator refused to commit.
    #[error("request rejected by coordinator: {0:?}")]
    Rejected(ReplyStatus),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, IpcError>;
