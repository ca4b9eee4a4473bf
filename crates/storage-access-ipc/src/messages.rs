//! Wire messages for committing a grant across the process boundary.
//!
//! There is exactly one request and one reply. Frames are CBOR-encoded and
//! carry the protocol version.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use storage_access_core::{AllowMode, Principal};

use crate::error::{IpcError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Correlates a reply with its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Generate a random request ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

/// Ask the privileged coordinator to record a storage-access grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub request_id: RequestId,
    /// Principal of the top-level site the grant is stored on.
    pub top_level_principal: Option<Principal>,
    /// Principal of the third party being granted access.
    pub tracking_principal: Option<Principal>,
    /// Origin of the tracking principal, without attribute suffix.
    pub tracking_origin: String,
    /// Raw [`AllowMode`] value.
    pub allow_mode: i32,
}

impl GrantRequest {
    pub fn new(
        top_level_principal: Option<Principal>,
        tracking_principal: Option<Principal>,
        tracking_origin: impl Into<String>,
        allow_mode: AllowMode,
    ) -> Self {
        Self {
            request_id: RequestId::random(),
            top_level_principal,
            tracking_principal,
            tracking_origin: tracking_origin.into(),
            allow_mode: allow_mode.as_i32(),
        }
    }
}

/// Outcome reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReplyStatus {
    /// The permission was written.
    Committed = 0,
    /// The write failed.
    Rejected = 1,
    /// The request was malformed or missing a principal.
    InvalidRequest = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantReply {
    pub request_id: RequestId,
    pub status: ReplyStatus,
}

/// Protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcMessage {
    GrantRequest(GrantRequest),
    GrantReply(GrantReply),
}

#[derive(Serialize, Deserialize)]
struct Frame {
    version: u8,
    message: IpcMessage,
}

impl IpcMessage {
    /// Encode into a versioned CBOR frame.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let frame = Frame {
            version: PROTOCOL_VERSION,
            message: self.clone(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&frame, &mut buf).map_err(|e| IpcError::Codec(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Decode a versioned CBOR frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let frame: Frame =
            ciborium::from_reader(bytes).map_err(|e| IpcError::Codec(e.to_string()))?;
        if frame.version != PROTOCOL_VERSION {
            return Err(IpcError::VersionMismatch {
                local: PROTOCOL_VERSION,
                peer: frame.version,
            });
        }
        Ok(frame.message)
    }

    pub fn into_request(self) -> Result<GrantRequest> {
        match self {
            IpcMessage::GrantRequest(request) => Ok(request),
            IpcMessage::GrantReply(_) => Err(IpcError::UnexpectedMessage("expected a grant request")),
        }
    }

    pub fn into_reply(self) -> Result<GrantReply> {
        match self {
            IpcMessage::GrantReply(reply) => Ok(reply),
            IpcMessage::GrantRequest(_) => Err(IpcError::UnexpectedMessage("expected a grant reply")),
        }
    }
}
