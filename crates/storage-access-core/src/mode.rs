//! Cookie behaviour modes.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The configured cookie behaviour.
///
/// Numeric values match the persisted preference encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum BehaviorMode {
    /// Accept all storage.
    Accept = 0,
    /// Reject all third-party storage.
    RejectForeign = 1,
    /// Reject all storage.
    Reject = 2,
    /// Limit third-party storage. Non-cookie storage treats this as reject.
    LimitForeign = 3,
    /// Reject storage for third-party trackers.
    RejectTracker = 4,
    /// Reject trackers and partition every other third party.
    RejectTrackerAndPartitionForeign = 5,
}

impl BehaviorMode {
    /// All modes, in numeric order.
    pub const ALL: [BehaviorMode; 6] = [
        BehaviorMode::Accept,
        BehaviorMode::RejectForeign,
        BehaviorMode::Reject,
        BehaviorMode::LimitForeign,
        BehaviorMode::RejectTracker,
        BehaviorMode::RejectTrackerAndPartitionForeign,
    ];

    /// Convert from the numeric preference value.
    pub fn from_i32(value: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| *mode as i32 == value)
            .ok_or(CoreError::UnknownBehavior(value))
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether this mode blocks third-party trackers.
    ///
    /// Only these two modes can ever require an explicit storage grant.
    pub fn rejects_trackers(self) -> bool {
        matches!(
            self,
            BehaviorMode::RejectTracker | BehaviorMode::RejectTrackerAndPartitionForeign
        )
    }

    /// Whether this mode blocks every third party regardless of tracking.
    pub fn rejects_foreign(self) -> bool {
        matches!(self, BehaviorMode::RejectForeign | BehaviorMode::LimitForeign)
    }
}

impl Default for BehaviorMode {
    fn default() -> Self {
        BehaviorMode::RejectTrackerAndPartitionForeign
    }
}
