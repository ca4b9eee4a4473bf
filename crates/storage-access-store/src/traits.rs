//! PermissionStore trait: the abstract interface for permission persistence.
//!
//! This trait allows the evaluator and the commit step to be
//! storage-agnostic. Implementations include SQLite (primary) and in-memory
//! (for tests).

use storage_access_core::{
    now_millis, Capability, ExpiryKind, PermissionKey, PermissionRecord, Principal,
};

use crate::error::Result;

/// Synchronous interface for permission records.
///
/// All methods take `&self`; implementations synchronize internally so a
/// single store can be shared by concurrent evaluations and commits.
pub trait PermissionStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Capability stored for exactly this principal and type.
    ///
    /// Returns `Default` when nothing is stored or the record has lapsed.
    /// No default permissions are consulted.
    fn test_permission(&self, principal: &Principal, permission_type: &str) -> Result<Capability>;

    /// Every live record stored for the principal.
    fn scan_for_principal(&self, principal: &Principal) -> Result<Vec<PermissionRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a record. Last write wins.
    fn add(
        &self,
        principal: &Principal,
        permission_type: &str,
        capability: Capability,
        expire_kind: ExpiryKind,
        expires_at: i64,
    ) -> Result<()>;

    /// Explicit revocation. Returns whether a record was removed.
    fn remove(&self, principal: &Principal, permission_type: &str) -> Result<bool>;

    /// Expiry sweep: drop every `Timed` record lapsed at `now`.
    fn remove_expired(&self, now: i64) -> Result<usize>;

    /// Session end: drop every `Session` record.
    fn end_session(&self) -> Result<usize>;
}

/// Extension trait for common store patterns.
pub trait PermissionStoreExt: PermissionStore {
    /// Record an Allow for a storage-access key.
    fn grant_storage_access(
        &self,
        top_level: &Principal,
        key: &PermissionKey,
        expire_kind: ExpiryKind,
        expires_at: i64,
    ) -> Result<()> {
        self.add(top_level, key.as_str(), Capability::Allow, expire_kind, expires_at)
    }

    /// Whether an Allow for a storage-access key is currently stored.
    fn has_storage_access(&self, top_level: &Principal, key: &PermissionKey) -> Result<bool> {
        Ok(self.test_permission(top_level, key.as_str())? == Capability::Allow)
    }

    /// Run the expiry sweep against the wall clock.
    fn sweep_expired(&self) -> Result<usize> {
        let removed = self.remove_expired(now_millis())?;
        if removed > 0 {
            tracing::debug!(removed, "swept expired permissions");
        }
        Ok(removed)
    }
}

impl<S: PermissionStore + ?Sized> PermissionStoreExt for S {}
