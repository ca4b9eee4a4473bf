//! The storage-access decision procedure.
//!
//! Every entry point runs the same short-circuit order: cookie override,
//! mode resolution, allow-list, the mode's own routine, sandboxing, and
//! finally the permission lookup for the derived tracking origin. The first
//! step that reaches a verdict wins.
//!
//! The evaluator never writes. It may be shared between threads and called
//! concurrently; repeated calls over unchanged collaborators return the same
//! [`Decision`].

use std::ops::ControlFlow;

use storage_access_core::{
    BehaviorMode, Capability, Decision, Origin, PermissionKey, Principal, RejectedReason,
    COOKIE_PERMISSION_TYPE,
};

use crate::channel::{ChannelInfo, ThirdPartyVerdict};
use crate::collaborators::{Collaborators, CookieJarSettings};
use crate::ids::InnerWindowId;
use crate::topology;

/// Outcome of a mode routine: a final decision, or the reason to report if
/// the permission lookup that follows finds nothing.
type Step = ControlFlow<Decision, RejectedReason>;

/// Evaluator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Stand in for an out-of-process top frame with the nearest in-process
    /// ancestor. Disabling it makes such windows resolve no top and deny.
    pub out_of_process_top_fallback: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            out_of_process_top_fallback: true,
        }
    }
}

/// Pure, synchronous storage-access evaluator.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    collaborators: Collaborators,
    options: EvaluatorOptions,
}

impl PolicyEvaluator {
    pub fn new(collaborators: Collaborators, options: EvaluatorOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn options(&self) -> EvaluatorOptions {
        self.options
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Window entry
    // ─────────────────────────────────────────────────────────────────────────

    /// May `window` access unpartitioned storage while loading `uri`?
    pub fn evaluate_window(&self, window: InnerWindowId, uri: &Origin) -> Decision {
        let c = &self.collaborators;
        let tree = c.tree.as_ref();

        let Some(principal) = tree.document_principal(window) else {
            tracing::debug!(%window, "window has no document");
            return Decision::deny_silently();
        };

        let Some(top_inner) =
            topology::resolve_top_inner(tree, window, self.options.out_of_process_top_fallback)
        else {
            tracing::warn!(%window, "no top window");
            return Decision::deny_silently();
        };

        if let Some(decision) = self.cookie_override(&principal) {
            return decision;
        }

        let behavior = if principal.is_extension() {
            BehaviorMode::Accept
        } else {
            c.settings.cookie_jar_settings(window).behavior
        };

        if behavior == BehaviorMode::Accept {
            tracing::debug!(%window, "cookie behavior accepts everything");
            return Decision::allow();
        }
        if c.allow_list.check_window(window) {
            tracing::debug!(%window, "window is allow-listed");
            return Decision::allow();
        }

        let blocked = match self.window_step(behavior, window, uri) {
            ControlFlow::Break(decision) => return decision,
            ControlFlow::Continue(reason) => reason,
        };

        if c.settings.is_storage_sandboxed(window) {
            tracing::debug!(%window, "document is sandboxed");
            return Decision::deny_silently();
        }

        let Some(context) = topology::tracking_context(tree, window, behavior) else {
            tracing::debug!(%window, "failed to derive the parent principal and tracking origin");
            return Decision::deny(blocked);
        };

        let key = PermissionKey::for_origin(&context.tracking_origin);
        if tree.has_storage_access_granted(top_inner, &key) {
            tracing::debug!(%key, "permission stored in the top window");
            return Decision::allow();
        }

        self.check_anti_tracking_permission(
            &context.top_level_principal,
            &key,
            principal.is_private(),
            Some(blocked),
        )
    }

    fn window_step(&self, behavior: BehaviorMode, window: InnerWindowId, uri: &Origin) -> Step {
        let tree = self.collaborators.tree.as_ref();
        let classifier = self.collaborators.classifier.as_ref();

        match behavior {
            BehaviorMode::Accept => ControlFlow::Break(Decision::allow()),
            BehaviorMode::Reject => {
                tracing::debug!(%window, "cookie behavior rejects everything");
                ControlFlow::Break(Decision::deny(RejectedReason::All))
            }
            BehaviorMode::RejectForeign | BehaviorMode::LimitForeign => {
                if topology::is_third_party_window(tree, window, Some(uri)) {
                    tracing::debug!(%window, ?behavior, "third-party window rejected by behavior");
                    ControlFlow::Break(Decision::deny(RejectedReason::Foreign))
                } else {
                    ControlFlow::Break(Decision::allow())
                }
            }
            BehaviorMode::RejectTracker => {
                if !topology::is_third_party_tracking_window(tree, classifier, window) {
                    tracing::debug!(%window, "not a third-party tracking window");
                    return ControlFlow::Break(Decision::allow());
                }
                if classifier.classify_window(window).is_social_tracking {
                    ControlFlow::Continue(RejectedReason::SocialTracker)
                } else {
                    ControlFlow::Continue(RejectedReason::Tracker)
                }
            }
            BehaviorMode::RejectTrackerAndPartitionForeign => {
                if topology::is_third_party_tracking_window(tree, classifier, window) {
                    ControlFlow::Continue(RejectedReason::Tracker)
                } else if topology::is_third_party_window(tree, window, Some(uri)) {
                    tracing::debug!(%window, "third-party context, storage is partitioned");
                    ControlFlow::Continue(RejectedReason::PartitionedForeign)
                } else {
                    tracing::debug!(%window, "not a third-party window");
                    ControlFlow::Break(Decision::allow())
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Channel entry
    // ─────────────────────────────────────────────────────────────────────────

    /// May the load described by `channel` access unpartitioned storage for
    /// `uri`?
    pub fn evaluate_channel(&self, channel: &ChannelInfo, uri: &Origin) -> Decision {
        let c = &self.collaborators;

        let Some(final_uri) = channel.final_uri.as_ref() else {
            tracing::debug!("failed to get the channel final URI, allowing");
            return Decision::allow();
        };

        let Some(top_level) = channel.resolve_top_level_principal() else {
            tracing::warn!(uri = %final_uri, "no top-level principal for channel");
            return Decision::deny_silently();
        };

        let Some(settings) = channel.cookie_jar_settings else {
            tracing::warn!(uri = %final_uri, "channel has no cookie jar settings, allowing");
            return Decision::allow();
        };

        let Some(channel_principal) = channel.channel_principal.as_ref() else {
            tracing::warn!(uri = %final_uri, "no channel principal");
            return Decision::deny_silently();
        };

        if let Some(decision) = self.cookie_override(channel_principal) {
            return decision;
        }

        let behavior = if final_uri.is_extension() {
            BehaviorMode::Accept
        } else {
            settings.behavior
        };

        if behavior == BehaviorMode::Accept {
            tracing::debug!(uri = %final_uri, "cookie behavior accepts everything");
            return Decision::allow();
        }
        if channel.is_http && c.allow_list.check_channel(channel) {
            tracing::debug!(uri = %final_uri, "channel is allow-listed");
            return Decision::allow();
        }
        if behavior == BehaviorMode::Reject {
            return Decision::deny(RejectedReason::All);
        }

        match channel.third_party {
            ThirdPartyVerdict::Unavailable => {
                tracing::debug!(uri = %final_uri, "no third-party utility, allowing");
                return Decision::allow();
            }
            ThirdPartyVerdict::Known(false) => {
                tracing::debug!(uri = %final_uri, "not a third-party channel");
                return Decision::allow();
            }
            ThirdPartyVerdict::Failed => {
                tracing::debug!(uri = %final_uri, "third-party check failed, continuing");
            }
            ThirdPartyVerdict::Known(true) => {}
        }

        let blocked = match self.channel_step(behavior, channel, uri) {
            ControlFlow::Break(decision) => return decision,
            ControlFlow::Continue(reason) => reason,
        };

        let parent = if behavior == BehaviorMode::RejectTracker {
            channel.top_level_storage_area_principal.as_ref()
        } else {
            channel.top_level_principal.as_ref()
        };
        let parent = match parent {
            Some(parent) => parent,
            None if channel.top_level_principal.is_some() => {
                tracing::debug!(uri = %final_uri, "parent window is the top-level window");
                return Decision::deny(blocked);
            }
            None => top_level,
        };

        let Some(tracking_uri) = channel.uri.as_deref() else {
            tracing::warn!(uri = %final_uri, "failed to get the channel URI, allowing");
            return Decision::allow();
        };
        let tracking_origin = match Origin::parse(tracking_uri) {
            Ok(origin) => origin.ascii_serialization(),
            Err(e) => {
                tracing::warn!(uri = tracking_uri, error = %e, "failed to compute the tracking origin");
                return Decision::deny_silently();
            }
        };

        let key = PermissionKey::for_origin(&tracking_origin);
        self.check_anti_tracking_permission(
            parent,
            &key,
            channel_principal.is_private(),
            Some(blocked),
        )
    }

    fn channel_step(&self, behavior: BehaviorMode, channel: &ChannelInfo, uri: &Origin) -> Step {
        let classification = self.collaborators.classifier.classify_channel(channel);

        match behavior {
            BehaviorMode::Accept => ControlFlow::Break(Decision::allow()),
            BehaviorMode::Reject => ControlFlow::Break(Decision::deny(RejectedReason::All)),
            BehaviorMode::RejectForeign | BehaviorMode::LimitForeign => {
                ControlFlow::Break(Decision::deny(RejectedReason::Foreign))
            }
            BehaviorMode::RejectTracker => match classification {
                Some(c) if !c.is_tracking => {
                    tracing::debug!("not a third-party tracking channel");
                    ControlFlow::Break(Decision::allow())
                }
                Some(c) if c.is_social_tracking => {
                    ControlFlow::Continue(RejectedReason::SocialTracker)
                }
                _ => ControlFlow::Continue(RejectedReason::Tracker),
            },
            BehaviorMode::RejectTrackerAndPartitionForeign => {
                if classification.map(|c| c.is_tracking).unwrap_or(false) {
                    ControlFlow::Continue(RejectedReason::Tracker)
                } else if topology::is_third_party_channel(channel, Some(uri)) {
                    ControlFlow::Continue(RejectedReason::PartitionedForeign)
                } else {
                    ControlFlow::Break(Decision::allow())
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Approximate and principal entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Best guess for a first-party window embedding `uri` when no load is at
    /// hand. Never reports a rejection reason except for a Deny override.
    pub fn approximate_without_channel(&self, window: InnerWindowId, uri: &Origin) -> Decision {
        let c = &self.collaborators;
        let tree = c.tree.as_ref();

        let Some(principal) = tree.document_principal(window) else {
            tracing::warn!(%window, "failed to get the first-party document");
            return Decision::deny_silently();
        };

        if !c.settings.cookie_jar_settings(window).rejects_third_party_trackers() {
            return Decision::allow();
        }
        if c.allow_list.check_window(window) {
            return Decision::allow();
        }
        if !topology::is_third_party_window(tree, window, Some(uri)) {
            return Decision::allow();
        }
        if let Some(decision) = self.cookie_override(&principal) {
            return decision;
        }

        let key = PermissionKey::for_origin(&uri.ascii_serialization());
        self.check_anti_tracking_permission(&principal, &key, principal.is_private(), None)
    }

    /// Access for a bare principal under the given settings.
    pub fn evaluate_principal(&self, principal: &Principal, settings: &CookieJarSettings) -> Decision {
        if let Some(decision) = self.cookie_override(principal) {
            return decision;
        }

        let behavior = if principal.is_extension() {
            BehaviorMode::Accept
        } else {
            settings.behavior
        };
        match behavior {
            BehaviorMode::Reject => Decision::deny(RejectedReason::All),
            _ => Decision::allow(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// An explicit cookie permission, if one is stored for a content
    /// principal.
    fn cookie_override(&self, principal: &Principal) -> Option<Decision> {
        if !principal.is_content() {
            return None;
        }

        let capability = match self
            .collaborators
            .store
            .test_permission(principal, COOKIE_PERMISSION_TYPE)
        {
            Ok(capability) => capability,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cookie permission");
                Capability::Default
            }
        };

        match capability {
            Capability::Default => None,
            Capability::Allow => {
                tracing::debug!(origin = %principal.origin(), "cookie permission allows access");
                Some(Decision::allow())
            }
            Capability::Deny => {
                tracing::debug!(origin = %principal.origin(), "cookie permission denies access");
                Some(Decision::deny(RejectedReason::ByPermission))
            }
        }
    }

    /// Test a storage-access grant for `key` on the top-level principal.
    ///
    /// Private sessions only honour session-scoped grants without a
    /// timestamp, so a grant persisted outside the session never leaks in.
    /// Store failures deny without a reason.
    pub fn check_anti_tracking_permission(
        &self,
        top_level: &Principal,
        key: &PermissionKey,
        private_browsing: bool,
        blocked: Option<RejectedReason>,
    ) -> Decision {
        let store = self.collaborators.store.as_ref();
        let denied = blocked
            .map(Decision::deny)
            .unwrap_or_else(Decision::deny_silently);

        if private_browsing {
            let records = match store.scan_for_principal(top_level) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to list permissions");
                    return Decision::deny_silently();
                }
            };

            if records.iter().any(|r| r.is_session_allow(key.as_str())) {
                tracing::debug!(%key, "found a matching session permission");
                Decision::allow()
            } else {
                denied
            }
        } else {
            match store.test_permission(top_level, key.as_str()) {
                Ok(Capability::Allow) => Decision::allow(),
                Ok(capability) => {
                    tracing::debug!(%key, ?capability, "no storage-access permission");
                    denied
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to test the permission");
                    Decision::deny_silently()
                }
            }
        }
    }
}
