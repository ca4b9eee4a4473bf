//! Forced expiry of automatically issued grants.
//!
//! An auto-grant is written with `Session` expiry, which alone could keep it
//! alive for as long as the browser stays open. Every such grant also gets an
//! observer that removes it once [`MAX_AUTO_GRANT_LIFETIME`] has elapsed,
//! whatever else happens in the meantime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use storage_access_core::{PermissionKey, Principal};
use storage_access_store::PermissionStore;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::MAX_AUTO_GRANT_LIFETIME;
use crate::error::GrantError;

type ObserverKey = (String, String);
type Observers = HashMap<ObserverKey, JoinHandle<()>>;

/// Registry of pending auto-grant expiry observers.
///
/// At most one observer runs per (principal, key). Dropping the registry
/// aborts every observer.
pub struct AutoGrantExpiry {
    store: Arc<dyn PermissionStore>,
    lifetime: Duration,
    observers: Arc<Mutex<Observers>>,
}

impl AutoGrantExpiry {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            lifetime: MAX_AUTO_GRANT_LIFETIME,
            observers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start an observer that removes the grant after the lifetime ceiling.
    ///
    /// A running observer for the same grant keeps its original deadline;
    /// returns `Ok(false)` in that case. Fails when no Tokio runtime is
    /// available to drive the observer.
    pub fn register(&self, principal: &Principal, key: &PermissionKey) -> Result<bool, GrantError> {
        let runtime = observer_runtime()?;
        Ok(self.register_on(&runtime, principal, key))
    }

    pub(crate) fn register_on(
        &self,
        runtime: &Handle,
        principal: &Principal,
        key: &PermissionKey,
    ) -> bool {
        let id = (principal.origin_with_suffix(), key.as_str().to_string());

        let mut observers = lock(&self.observers);
        if observers.get(&id).is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!(%key, "auto-grant expiry observer already running");
            return false;
        }

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.observers);
        let lifetime = self.lifetime;
        let principal = principal.clone();
        let key = key.clone();
        let task_id = id.clone();

        let handle = runtime.spawn(async move {
            tokio::time::sleep(lifetime).await;
            match store.remove(&principal, key.as_str()) {
                Ok(removed) => {
                    tracing::debug!(%key, removed, "auto-grant reached its lifetime ceiling")
                }
                Err(e) => tracing::warn!(%key, error = %e, "failed to expire auto-grant"),
            }
            lock(&registry).remove(&task_id);
        });

        observers.insert(id, handle);
        true
    }

    /// Whether an observer is pending for this grant.
    pub fn is_registered(&self, principal: &Principal, key: &PermissionKey) -> bool {
        let id = (principal.origin_with_suffix(), key.as_str().to_string());
        lock(&self.observers)
            .get(&id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of pending observers.
    pub fn pending(&self) -> usize {
        lock(&self.observers)
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for AutoGrantExpiry {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.observers).drain() {
            handle.abort();
        }
    }
}

/// The runtime auto-grant observers are spawned on.
pub(crate) fn observer_runtime() -> Result<Handle, GrantError> {
    Handle::try_current().map_err(|_| {
        tracing::warn!("no runtime for the auto-grant expiry observer");
        GrantError::ExpiryUnavailable
    })
}

/// The registry only holds join handles, so a poisoned lock is still usable.
fn lock(observers: &Mutex<Observers>) -> MutexGuard<'_, Observers> {
    observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
