//! The grant coordinator: turns a request for storage access into a
//! committed permission.
//!
//! The pipeline is strictly sequential. It suspends in at most two places,
//! the caller's final check and the cross-process commit, and every early
//! return happens before anything is written.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use storage_access_core::{
    AllowMode, BehaviorMode, GrantReason, PermissionKey, Principal, RejectedReason,
};
use storage_access_ipc::{IpcError, RemoteCoordinatorChannel, ReplyStatus};
use storage_access_policy::{
    topology, BrowsingContextId, Collaborators, PolicyEvaluator, TrackingContext,
};

use crate::commit::DurableCommitter;
use crate::config::EngineConfig;
use crate::error::GrantError;
use crate::notifier::{BlockingDecision, ContentBlockingNotifier};

/// Caller-supplied last step before the commit.
///
/// Invoked at most once, after every other check has passed. Resolves to the
/// mode the grant is committed with; an error rejects the request.
pub type FinalCheck = Box<
    dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<AllowMode>> + Send>> + Send,
>;

/// Box an async closure as a [`FinalCheck`].
pub fn final_check<F, Fut>(check: F) -> FinalCheck
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<AllowMode>> + Send + 'static,
{
    Box::new(move || -> Pin<Box<dyn Future<Output = anyhow::Result<AllowMode>> + Send>> {
        Box::pin(check())
    })
}

/// Where the durable commit happens.
#[derive(Clone)]
pub enum ProcessRole {
    /// This process owns the permission store.
    Parent(Arc<DurableCommitter>),
    /// Commits travel to the privileged process over this channel.
    Content(Arc<dyn RemoteCoordinatorChannel>),
}

/// Successful outcome of a grant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Nothing needed granting under the current settings.
    AlreadyAllowed,
    /// A grant was committed. A local commit always reports `Allow`; a
    /// remote one reports the mode that was sent.
    Granted(AllowMode),
}

/// Drives storage-access grant requests to a commit.
pub struct GrantCoordinator {
    evaluator: PolicyEvaluator,
    notifier: Arc<dyn ContentBlockingNotifier>,
    role: ProcessRole,
    config: EngineConfig,
}

impl GrantCoordinator {
    pub fn new(
        collaborators: Collaborators,
        notifier: Arc<dyn ContentBlockingNotifier>,
        role: ProcessRole,
        config: EngineConfig,
    ) -> Self {
        Self {
            evaluator: PolicyEvaluator::new(collaborators, config.evaluator_options()),
            notifier,
            role,
            config,
        }
    }

    /// The evaluator sharing this coordinator's collaborators.
    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Request first-party storage access for `principal`, acting from the
    /// window hosted by `parent_context`.
    ///
    /// Resolves exactly once. A caller that drops the future abandons the
    /// request; if that happens while waiting on the remote commit, the
    /// privileged side may still complete it.
    pub async fn request_access_grant(
        &self,
        principal: &Principal,
        parent_context: BrowsingContextId,
        reason: GrantReason,
        final_check: Option<FinalCheck>,
    ) -> Result<GrantOutcome, GrantError> {
        let c = self.evaluator.collaborators();
        let tree = c.tree.as_ref();

        if !self.config.heuristic_enabled(reason) {
            tracing::debug!(?reason, "grant heuristic is disabled");
            return Err(GrantError::PolicyGate(reason));
        }

        let parent_outer = tree
            .outer_window(parent_context)
            .ok_or(GrantError::ContextResolution("parent outer window"))?;
        let parent_inner = tree
            .current_inner_window(parent_outer)
            .ok_or(GrantError::ContextResolution("parent inner window"))?;
        let parent_principal = tree
            .document_principal(parent_inner)
            .ok_or(GrantError::ContextResolution("parent document"))?;

        let settings = c.settings.cookie_jar_settings(parent_inner);
        if !settings.rejects_third_party_trackers() {
            tracing::debug!(behavior = ?settings.behavior, "trackers are not rejected, nothing to grant");
            return Ok(GrantOutcome::AlreadyAllowed);
        }

        if c.allow_list.check_window(parent_inner) {
            tracing::debug!(window = %parent_inner, "parent window is allow-listed");
            return Ok(GrantOutcome::AlreadyAllowed);
        }

        let context = if tree.is_top_level(parent_outer) {
            tracing::debug!(window = %parent_inner, "parent window is first party");
            TrackingContext {
                top_level_principal: parent_principal,
                tracking_principal: principal.clone(),
                tracking_origin: principal.origin().ascii_serialization(),
            }
        } else {
            let qualifies = match settings.behavior {
                BehaviorMode::RejectTracker => {
                    topology::is_third_party_tracking_window(tree, c.classifier.as_ref(), parent_inner)
                }
                BehaviorMode::RejectTrackerAndPartitionForeign => {
                    topology::is_third_party_window(tree, parent_inner, None)
                }
                BehaviorMode::Accept
                | BehaviorMode::Reject
                | BehaviorMode::RejectForeign
                | BehaviorMode::LimitForeign => false,
            };
            if !qualifies {
                tracing::debug!(window = %parent_inner, behavior = ?settings.behavior, "parent window is not a qualifying third party");
                return Err(GrantError::NotThirdParty);
            }

            if c.settings.is_storage_sandboxed(parent_inner) {
                tracing::debug!(window = %parent_inner, "parent document is sandboxed");
                return Err(GrantError::Sandboxed);
            }

            // Opener grants reach nested frames too, so never the
            // storage-area principal here.
            topology::tracking_context(tree, parent_inner, BehaviorMode::Accept)
                .ok_or(GrantError::ContextResolution("tracking principal"))?
        };

        let top_outer = tree
            .outer_window(tree.top(parent_context))
            .ok_or(GrantError::ContextResolution("top outer window"))?;
        let top_inner = tree
            .current_inner_window(top_outer)
            .ok_or(GrantError::ContextResolution("top inner window"))?;

        if !reason.is_interaction_confirmed()
            && self.config.requires_interaction(&context.tracking_principal)
            && !c.interactions.exists(&context.tracking_principal)
        {
            tracing::debug!(
                origin = %context.tracking_origin,
                "tracking origin has not been interacted with"
            );
            self.notifier
                .on_decision(parent_inner, BlockingDecision::Block, RejectedReason::Tracker);
            return Err(GrantError::InteractionRequired {
                origin: context.tracking_origin,
            });
        }

        let top_window = tree
            .top_window(parent_inner)
            .ok_or(GrantError::ContextResolution("top-level window"))?;

        let mode = match final_check {
            Some(check) => check().await.map_err(|e| {
                tracing::debug!(error = %e, "final check rejected the grant");
                GrantError::FinalCheckRejected
            })?,
            None => AllowMode::OneShot,
        };

        let TrackingContext {
            top_level_principal,
            tracking_principal,
            tracking_origin,
        } = context;

        let key = PermissionKey::for_origin(&tracking_origin);
        tracing::debug!(%key, window = %top_inner, ?mode, "saving storage access in the top window");
        tree.save_storage_access_granted(top_inner, &key);
        tree.storage_access_granted(parent_inner);

        self.notifier
            .on_event(top_window, &tracking_origin, RejectedReason::Tracker, reason);
        self.notifier
            .report_unblocking(parent_inner, &tracking_origin, reason);

        let granted = match &self.role {
            ProcessRole::Parent(committer) => {
                committer.save_access_for_origin(
                    Some(&top_level_principal),
                    Some(&tracking_principal),
                    &tracking_origin,
                    mode,
                )?;
                AllowMode::Allow
            }
            ProcessRole::Content(channel) => {
                tracing::debug!(%key, "asking the privileged process to save the permission");
                let reply = channel
                    .send_grant_request(
                        Some(top_level_principal),
                        Some(tracking_principal),
                        tracking_origin,
                        mode,
                    )
                    .await?;
                if reply.status != ReplyStatus::Committed {
                    tracing::warn!(%key, status = ?reply.status, "privileged process refused the grant");
                    return Err(IpcError::Rejected(reply.status).into());
                }
                mode
            }
        };

        Ok(GrantOutcome::Granted(granted))
    }
}

impl std::fmt::Debug for GrantCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
