//! Evaluation outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why storage access was refused.
///
/// Codes match the content-blocking state bits reported to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RejectedReason {
    /// An explicit Deny cookie permission for the principal.
    ByPermission = 0x1000_0000,
    /// A third-party tracker.
    Tracker = 0x2000_0000,
    /// A third-party social tracker.
    SocialTracker = 0x0100_0000,
    /// Every cookie is rejected.
    All = 0x4000_0000,
    /// Every third-party cookie is rejected.
    Foreign = 0x0000_0080,
    /// A non-tracking third party whose storage is partitioned.
    PartitionedForeign = 0x8000_0000,
}

impl RejectedReason {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        [
            RejectedReason::ByPermission,
            RejectedReason::Tracker,
            RejectedReason::SocialTracker,
            RejectedReason::All,
            RejectedReason::Foreign,
            RejectedReason::PartitionedForeign,
        ]
        .into_iter()
        .find(|r| r.code() == code)
    }
}

/// Outcome of a storage-access evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub rejected_reason: Option<RejectedReason>,
}

impl Decision {
    /// Storage access is allowed.
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            rejected_reason: None,
        }
    }

    /// Storage access is denied for the given reason.
    pub const fn deny(reason: RejectedReason) -> Self {
        Self {
            allowed: false,
            rejected_reason: Some(reason),
        }
    }

    /// Storage access is denied without a reportable reason.
    pub const fn deny_silently() -> Self {
        Self {
            allowed: false,
            rejected_reason: None,
        }
    }

    pub const fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Self::allow()
        } else {
            Self::deny_silently()
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.allowed, self.rejected_reason) {
            (true, _) => f.write_str("allow"),
            (false, Some(reason)) => write!(f, "deny ({reason:?})"),
            (false, None) => f.write_str("deny"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_roundtrip() {
        for reason in [
            RejectedReason::ByPermission,
            RejectedReason::Tracker,
            RejectedReason::SocialTracker,
            RejectedReason::All,
            RejectedReason::Foreign,
            RejectedReason::PartitionedForeign,
        ] {
            assert_eq!(RejectedReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(RejectedReason::from_code(0), None);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::allow().to_string(), "allow");
        assert_eq!(
            Decision::deny(RejectedReason::Tracker).to_string(),
            "deny (Tracker)"
        );
        assert_eq!(Decision::deny_silently().to_string(), "deny");
    }
}
