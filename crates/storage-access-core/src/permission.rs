//! Permission records and grant vocabulary.
//!
//! A [`PermissionRecord`] is written only by the durable commit step, read by
//! the evaluator, and removed by revocation, the expiry sweep, or session end.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Permission type carrying per-principal cookie overrides.
pub const COOKIE_PERMISSION_TYPE: &str = "cookie";

/// The capability stored for a (principal, type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Capability {
    /// No explicit decision.
    Default = 0,
    Allow = 1,
    Deny = 2,
}

impl Capability {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Capability::Default),
            1 => Ok(Capability::Allow),
            2 => Ok(Capability::Deny),
            other => Err(CoreError::UnknownCapability(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether this is an explicit Allow or Deny.
    pub fn is_explicit(self) -> bool {
        self != Capability::Default
    }
}

/// How a permission record expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ExpiryKind {
    /// Lives until explicitly removed.
    Never = 0,
    /// Lives until the session ends. Never written to durable storage.
    Session = 1,
    /// Lives until an absolute timestamp.
    Timed = 2,
}

impl ExpiryKind {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ExpiryKind::Never),
            1 => Ok(ExpiryKind::Session),
            2 => Ok(ExpiryKind::Timed),
            other => Err(CoreError::UnknownExpiryKind(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// A stored permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// `Principal::origin_with_suffix()` of the principal the record belongs to.
    pub principal: String,
    /// Permission type, e.g. a storage-access key or `"cookie"`.
    pub permission_type: String,
    pub capability: Capability,
    pub expire_kind: ExpiryKind,
    /// Absolute expiry in Unix milliseconds; zero when not timed.
    pub expires_at: i64,
}

impl PermissionRecord {
    /// Whether the record has lapsed at `now`.
    ///
    /// Only `Timed` records lapse on their own.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_kind == ExpiryKind::Timed && self.expires_at <= now
    }

    /// The exact shape a private-browsing grant must have to be honoured:
    /// an Allow, session-scoped, without an absolute timestamp.
    pub fn is_session_allow(&self, permission_type: &str) -> bool {
        self.permission_type == permission_type
            && self.capability == Capability::Allow
            && self.expire_kind == ExpiryKind::Session
            && self.expires_at == 0
    }
}

/// Why a storage-access grant is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantReason {
    /// A tracker opened a popup from the first party.
    Opener,
    /// A tracker opened a popup after the user interacted with it.
    OpenerAfterUserInteraction,
    /// An explicit request through the storage-access API.
    StorageAccessApi,
}

impl GrantReason {
    /// Whether the reason itself proves a prior user interaction.
    pub fn is_interaction_confirmed(self) -> bool {
        self == GrantReason::OpenerAfterUserInteraction
    }
}

/// How a committed grant is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AllowMode {
    /// Grant produced without an explicit prompt choice.
    OneShot = 0,
    /// The user explicitly allowed access.
    Allow = 1,
    /// A heuristic granted access automatically. Bounded to a short lifetime.
    AllowAutoGrant = 2,
}

impl AllowMode {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(AllowMode::OneShot),
            1 => Ok(AllowMode::Allow),
            2 => Ok(AllowMode::AllowAutoGrant),
            other => Err(CoreError::UnknownAllowMode(other)),
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expire_kind: ExpiryKind, expires_at: i64) -> PermissionRecord {
        PermissionRecord {
            principal: "https://news.example".into(),
            permission_type: "3rdPartyStorage^https://tracker.test".into(),
            capability: Capability::Allow,
            expire_kind,
            expires_at,
        }
    }

    #[test]
    fn test_only_timed_records_expire() {
        assert!(record(ExpiryKind::Timed, 1000).is_expired(1000));
        assert!(!record(ExpiryKind::Timed, 1000).is_expired(999));
        assert!(!record(ExpiryKind::Session, 0).is_expired(i64::MAX));
        assert!(!record(ExpiryKind::Never, 0).is_expired(i64::MAX));
    }

    #[test]
    fn test_session_allow_shape() {
        let key = "3rdPartyStorage^https://tracker.test";
        assert!(record(ExpiryKind::Session, 0).is_session_allow(key));
        assert!(!record(ExpiryKind::Session, 5).is_session_allow(key));
        assert!(!record(ExpiryKind::Timed, 0).is_session_allow(key));
        assert!(!record(ExpiryKind::Session, 0).is_session_allow("cookie"));

        let mut denied = record(ExpiryKind::Session, 0);
        denied.capability = Capability::Deny;
        assert!(!denied.is_session_allow(key));
    }

    #[test]
    fn test_allow_mode_wire_values() {
        assert_eq!(AllowMode::OneShot.as_i32(), 0);
        assert_eq!(AllowMode::from_i32(2).unwrap(), AllowMode::AllowAutoGrant);
        assert!(AllowMode::from_i32(3).is_err());
    }

    #[test]
    fn test_interaction_confirmed_reason() {
        assert!(GrantReason::OpenerAfterUserInteraction.is_interaction_confirmed());
        assert!(!GrantReason::Opener.is_interaction_confirmed());
        assert!(!GrantReason::StorageAccessApi.is_interaction_confirmed());
    }
}
