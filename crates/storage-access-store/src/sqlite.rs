//! SQLite implementation of the PermissionStore trait.
//!
//! Durable records (`Never` and `Timed`) live in SQLite. `Session` records
//! live in an in-memory overlay and are never written to disk, so a private
//! or auto-granted permission cannot outlive the session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use storage_access_core::{now_millis, Capability, ExpiryKind, PermissionRecord, Principal};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::PermissionStore;

type RecordKey = (String, String);

/// SQLite-based store implementation.
///
/// Thread-safe via internal mutexes. Lock order is always connection, then
/// session overlay.
pub struct SqlitePermissionStore {
    conn: Mutex<Connection>,
    session: Mutex<HashMap<RecordKey, PermissionRecord>>,
}

impl SqlitePermissionStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::with_connection(conn))
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            session: Mutex::new(HashMap::new()),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("connection: {}", e)))
    }

    fn session(&self) -> Result<MutexGuard<'_, HashMap<RecordKey, PermissionRecord>>> {
        self.session
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("session overlay: {}", e)))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, u32, u32, i64)> {
    Ok((
        row.get("origin")?,
        row.get("type")?,
        row.get("capability")?,
        row.get("expire_type")?,
        row.get("expire_time")?,
    ))
}

fn decode_record(raw: (String, String, u32, u32, i64)) -> Result<PermissionRecord> {
    let (principal, permission_type, capability, expire_type, expires_at) = raw;
    let expire_kind = ExpiryKind::from_u32(expire_type)?;
    if expire_kind == ExpiryKind::Session {
        return Err(StoreError::InvalidData(format!(
            "session record for {principal} found on disk"
        )));
    }
    Ok(PermissionRecord {
        principal,
        permission_type,
        capability: Capability::from_u32(capability)?,
        expire_kind,
        expires_at,
    })
}

impl PermissionStore for SqlitePermissionStore {
    fn test_permission(&self, principal: &Principal, permission_type: &str) -> Result<Capability> {
        let origin = principal.origin_with_suffix();
        let now = now_millis();

        let conn = self.conn()?;
        if let Some(record) = self
            .session()?
            .get(&(origin.clone(), permission_type.to_string()))
        {
            return Ok(record.capability);
        }

        let raw = conn
            .query_row(
                "SELECT origin, type, capability, expire_type, expire_time
                 FROM permissions WHERE origin = ?1 AND type = ?2",
                params![origin, permission_type],
                row_to_record,
            )
            .optional()?;

        match raw {
            Some(raw) => {
                let record = decode_record(raw)?;
                if record.is_expired(now) {
                    Ok(Capability::Default)
                } else {
                    Ok(record.capability)
                }
            }
            None => Ok(Capability::Default),
        }
    }

    fn scan_for_principal(&self, principal: &Principal) -> Result<Vec<PermissionRecord>> {
        let origin = principal.origin_with_suffix();
        let now = now_millis();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT origin, type, capability, expire_type, expire_time
             FROM permissions WHERE origin = ?1 ORDER BY type",
        )?;
        let rows = stmt.query_map(params![origin], row_to_record)?;

        let mut records = Vec::new();
        for raw in rows {
            let record = decode_record(raw?)?;
            if !record.is_expired(now) {
                records.push(record);
            }
        }

        records.extend(
            self.session()?
                .values()
                .filter(|r| r.principal == origin)
                .cloned(),
        );
        Ok(records)
    }

    fn add(
        &self,
        principal: &Principal,
        permission_type: &str,
        capability: Capability,
        expire_kind: ExpiryKind,
        expires_at: i64,
    ) -> Result<()> {
        let origin = principal.origin_with_suffix();
        let key = (origin.clone(), permission_type.to_string());

        let conn = self.conn()?;
        let mut session = self.session()?;

        if expire_kind == ExpiryKind::Session {
            conn.execute(
                "DELETE FROM permissions WHERE origin = ?1 AND type = ?2",
                params![origin, permission_type],
            )?;
            session.insert(
                key,
                PermissionRecord {
                    principal: origin,
                    permission_type: permission_type.to_string(),
                    capability,
                    expire_kind,
                    expires_at,
                },
            );
            return Ok(());
        }

        conn.execute(
            "INSERT INTO permissions (origin, type, capability, expire_type, expire_time, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(origin, type) DO UPDATE SET
                capability = excluded.capability,
                expire_type = excluded.expire_type,
                expire_time = excluded.expire_time,
                modified_at = excluded.modified_at",
            params![
                origin,
                permission_type,
                capability.as_u32(),
                expire_kind.as_u32(),
                expires_at,
                now_millis()
            ],
        )?;
        session.remove(&key);
        Ok(())
    }

    fn remove(&self, principal: &Principal, permission_type: &str) -> Result<bool> {
        let origin = principal.origin_with_suffix();

        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM permissions WHERE origin = ?1 AND type = ?2",
            params![origin, permission_type],
        )?;
        let dropped = self
            .session()?
            .remove(&(origin, permission_type.to_string()))
            .is_some();

        Ok(deleted > 0 || dropped)
    }

    fn remove_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM permissions WHERE expire_type = ?1 AND expire_time <= ?2",
            params![ExpiryKind::Timed.as_u32(), now],
        )?;
        Ok(deleted)
    }

    fn end_session(&self) -> Result<usize> {
        let mut session = self.session()?;
        let dropped = session.len();
        session.clear();
        Ok(dropped)
    }
}
