//! External verdict providers consumed by the engine.
//!
//! The engine implements none of these. Classification lists, the allow-list
//! and interaction history are maintained elsewhere; the engine only reads
//! their answers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage_access_core::{BehaviorMode, Principal};
use storage_access_store::PermissionStore;

use crate::channel::ChannelInfo;
use crate::context::ContextTree;
use crate::ids::InnerWindowId;

/// Cookie-jar settings in effect for a document or a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CookieJarSettings {
    pub behavior: BehaviorMode,
}

impl CookieJarSettings {
    pub fn new(behavior: BehaviorMode) -> Self {
        Self { behavior }
    }

    /// Whether third-party trackers are rejected under these settings.
    pub fn rejects_third_party_trackers(&self) -> bool {
        self.behavior.rejects_trackers()
    }
}

/// Per-window settings.
pub trait SettingsSource: Send + Sync {
    /// The cookie-jar settings of the window's document.
    fn cookie_jar_settings(&self, window: InnerWindowId) -> CookieJarSettings;

    /// Whether the window's document is sandboxed without storage access.
    fn is_storage_sandboxed(&self, window: InnerWindowId) -> bool;
}

/// Global exemption list.
pub trait AllowListChecker: Send + Sync {
    fn check_window(&self, window: InnerWindowId) -> bool;

    fn check_channel(&self, channel: &ChannelInfo) -> bool;
}

/// A classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    /// The resource is a third-party tracking resource.
    pub is_tracking: bool,
    /// The tracker is a social tracker.
    pub is_social_tracking: bool,
}

impl Classification {
    pub const NONE: Classification = Classification {
        is_tracking: false,
        is_social_tracking: false,
    };

    pub const TRACKER: Classification = Classification {
        is_tracking: true,
        is_social_tracking: false,
    };

    pub const SOCIAL_TRACKER: Classification = Classification {
        is_tracking: true,
        is_social_tracking: true,
    };
}

/// Tracker classification for windows and loads.
pub trait TrackerClassifier: Send + Sync {
    /// Classification of the window's document load.
    fn classify_window(&self, window: InnerWindowId) -> Classification;

    /// Classification of a network load. `None` for a channel that was never
    /// classified.
    fn classify_channel(&self, channel: &ChannelInfo) -> Option<Classification> {
        channel.classification
    }
}

/// Record of prior user interaction with an origin.
pub trait InteractionRecord: Send + Sync {
    fn exists(&self, principal: &Principal) -> bool;
}

/// Every capability the evaluator and coordinator consume, bundled.
#[derive(Clone)]
pub struct Collaborators {
    pub tree: Arc<dyn ContextTree>,
    pub settings: Arc<dyn SettingsSource>,
    pub allow_list: Arc<dyn AllowListChecker>,
    pub classifier: Arc<dyn TrackerClassifier>,
    pub interactions: Arc<dyn InteractionRecord>,
    pub store: Arc<dyn PermissionStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
