//! In-memory implementation of the PermissionStore trait.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Used by tests and by private-only profiles.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use storage_access_core::{now_millis, Capability, ExpiryKind, PermissionRecord, Principal};

use crate::error::{Result, StoreError};
use crate::traits::PermissionStore;

type RecordKey = (String, String);

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryPermissionStore {
    records: RwLock<HashMap<RecordKey, PermissionRecord>>,
}

impl MemoryPermissionStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records, lapsed or not.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<RecordKey, PermissionRecord>>> {
        self.records
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<RecordKey, PermissionRecord>>> {
        self.records
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_key(principal: &Principal, permission_type: &str) -> RecordKey {
    (principal.origin_with_suffix(), permission_type.to_string())
}

impl PermissionStore for MemoryPermissionStore {
    fn test_permission(&self, principal: &Principal, permission_type: &str) -> Result<Capability> {
        let records = self.read()?;
        let now = now_millis();
        Ok(records
            .get(&record_key(principal, permission_type))
            .filter(|r| !r.is_expired(now))
            .map(|r| r.capability)
            .unwrap_or(Capability::Default))
    }

    fn scan_for_principal(&self, principal: &Principal) -> Result<Vec<PermissionRecord>> {
        let records = self.read()?;
        let owner = principal.origin_with_suffix();
        let now = now_millis();
        Ok(records
            .values()
            .filter(|r| r.principal == owner && !r.is_expired(now))
            .cloned()
            .collect())
    }

    fn add(
        &self,
        principal: &Principal,
        permission_type: &str,
        capability: Capability,
        expire_kind: ExpiryKind,
        expires_at: i64,
    ) -> Result<()> {
        let mut records = self.write()?;
        let key = record_key(principal, permission_type);
        records.insert(
            key.clone(),
            PermissionRecord {
                principal: key.0,
                permission_type: key.1,
                capability,
                expire_kind,
                expires_at,
            },
        );
        Ok(())
    }

    fn remove(&self, principal: &Principal, permission_type: &str) -> Result<bool> {
        let mut records = self.write()?;
        Ok(records
            .remove(&record_key(principal, permission_type))
            .is_some())
    }

    fn remove_expired(&self, now: i64) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok(before - records.len())
    }

    fn end_session(&self) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, r| r.expire_kind != ExpiryKind::Session);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PermissionStoreExt;
    use storage_access_core::PermissionKey;

    fn top() -> Principal {
        Principal::from_url("https://news.example").unwrap()
    }

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryPermissionStore::new();
        let key = PermissionKey::for_origin("https://tracker.test");

        assert_eq!(
            store.test_permission(&top(), key.as_str()).unwrap(),
            Capability::Default
        );

        store
            .grant_storage_access(&top(), &key, ExpiryKind::Never, 0)
            .unwrap();
        assert!(store.has_storage_access(&top(), &key).unwrap());
        assert_eq!(store.scan_for_principal(&top()).unwrap().len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryPermissionStore::new();
        store
            .add(&top(), "cookie", Capability::Allow, ExpiryKind::Never, 0)
            .unwrap();
        store
            .add(&top(), "cookie", Capability::Deny, ExpiryKind::Never, 0)
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.test_permission(&top(), "cookie").unwrap(),
            Capability::Deny
        );
    }

    #[test]
    fn test_private_principal_does_not_alias() {
        let store = MemoryPermissionStore::new();
        let key = PermissionKey::for_origin("https://tracker.test");
        store
            .grant_storage_access(&top(), &key, ExpiryKind::Never, 0)
            .unwrap();

        let private = top().with_private_browsing_id(1);
        assert!(!store.has_storage_access(&private, &key).unwrap());
        assert!(store.scan_for_principal(&private).unwrap().is_empty());
    }

    #[test]
    fn test_lapsed_record_is_invisible_then_swept() {
        let store = MemoryPermissionStore::new();
        store
            .add(&top(), "cookie", Capability::Allow, ExpiryKind::Timed, 1)
            .unwrap();

        assert_eq!(
            store.test_permission(&top(), "cookie").unwrap(),
            Capability::Default
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove_expired(now_millis()).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_end_session_keeps_durable_records() {
        let store = MemoryPermissionStore::new();
        store
            .add(&top(), "a", Capability::Allow, ExpiryKind::Session, 0)
            .unwrap();
        store
            .add(&top(), "b", Capability::Allow, ExpiryKind::Never, 0)
            .unwrap();

        assert_eq!(store.end_session().unwrap(), 1);
        assert_eq!(
            store.test_permission(&top(), "b").unwrap(),
            Capability::Allow
        );
    }

    #[test]
    fn test_remove() {
        let store = MemoryPermissionStore::new();
        store
            .add(&top(), "cookie", Capability::Deny, ExpiryKind::Never, 0)
            .unwrap();
        assert!(store.remove(&top(), "cookie").unwrap());
        assert!(!store.remove(&top(), "cookie").unwrap());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn capability() -> impl Strategy<Value = Capability> {
            prop_oneof![
                Just(Capability::Allow),
                Just(Capability::Deny),
            ]
        }

        proptest! {
            #[test]
            fn last_write_wins(writes in prop::collection::vec(capability(), 1..8)) {
                let store = MemoryPermissionStore::new();
                for capability in &writes {
                    store
                        .add(&top(), "cookie", *capability, ExpiryKind::Never, 0)
                        .unwrap();
                }
                prop_assert_eq!(store.len(), 1);
                prop_assert_eq!(
                    store.test_permission(&top(), "cookie").unwrap(),
                    *writes.last().unwrap()
                );
            }
        }
    }
}
