//! Durable commit of storage-access grants.
//!
//! Runs only in the privileged process. Content processes reach it through
//! the grant request protocol; [`DurableCommitter`] is also the handler that
//! answers those requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use storage_access_core::{now_millis, AllowMode, Capability, ExpiryKind, PermissionKey, Principal};
use storage_access_ipc::{GrantRequest, GrantRequestHandler, ReplyStatus};
use storage_access_store::PermissionStore;

use crate::config::EngineConfig;
use crate::error::GrantError;
use crate::expiry::{observer_runtime, AutoGrantExpiry};

/// Writes grants into the permission store with the right expiry.
pub struct DurableCommitter {
    store: Arc<dyn PermissionStore>,
    expiry: AutoGrantExpiry,
    expiration: Duration,
}

impl DurableCommitter {
    pub fn new(store: Arc<dyn PermissionStore>, config: &EngineConfig) -> Self {
        Self {
            expiry: AutoGrantExpiry::new(Arc::clone(&store)),
            store,
            expiration: config.storage_access_expiration(),
        }
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    pub fn expiry(&self) -> &AutoGrantExpiry {
        &self.expiry
    }

    /// Record that `tracking_origin` may access storage under `top_level`.
    ///
    /// Private sessions and auto-grants are written with `Session` expiry so
    /// they never reach disk; everything else expires after the configured
    /// lifetime. Auto-grants additionally get a forced-expiry observer.
    pub fn save_access_for_origin(
        &self,
        top_level: Option<&Principal>,
        tracking: Option<&Principal>,
        tracking_origin: &str,
        mode: AllowMode,
    ) -> Result<PermissionKey, GrantError> {
        let (Some(top_level), Some(_tracking)) = (top_level, tracking) else {
            tracing::warn!(tracking_origin, "invalid input arguments passed");
            return Err(GrantError::InvalidCommit(
                "both principals are required".into(),
            ));
        };

        let (expire_kind, expires_at) = if top_level.is_private() || mode == AllowMode::AllowAutoGrant
        {
            (ExpiryKind::Session, 0)
        } else {
            let lifetime = i64::try_from(self.expiration.as_millis()).unwrap_or(i64::MAX);
            (ExpiryKind::Timed, now_millis().saturating_add(lifetime))
        };

        // An auto-grant without its observer would never be force-expired.
        let runtime = match mode {
            AllowMode::AllowAutoGrant => Some(observer_runtime()?),
            _ => None,
        };

        let key = PermissionKey::for_origin(tracking_origin);
        tracing::debug!(
            top_level = %top_level.origin(),
            %key,
            ?expire_kind,
            "saving a first-party storage permission"
        );

        if let Err(e) = self
            .store
            .add(top_level, key.as_str(), Capability::Allow, expire_kind, expires_at)
        {
            tracing::warn!(%key, error = %e, "failed to save storage permission");
            return Err(GrantError::Store(e));
        }

        if let Some(runtime) = runtime {
            self.expiry.register_on(&runtime, top_level, &key);
        }
        Ok(key)
    }
}

#[async_trait]
impl GrantRequestHandler for DurableCommitter {
    async fn handle_grant_request(&self, request: GrantRequest) -> ReplyStatus {
        let Ok(mode) = AllowMode::from_i32(request.allow_mode) else {
            tracing::warn!(allow_mode = request.allow_mode, "unknown allow mode in grant request");
            return ReplyStatus::InvalidRequest;
        };

        match self.save_access_for_origin(
            request.top_level_principal.as_ref(),
            request.tracking_principal.as_ref(),
            &request.tracking_origin,
            mode,
        ) {
            Ok(_) => ReplyStatus::Committed,
            Err(GrantError::InvalidCommit(_)) => ReplyStatus::InvalidRequest,
            Err(_) => ReplyStatus::Rejected,
        }
    }
}
