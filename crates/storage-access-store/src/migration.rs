//! Database schema migrations for SQLite.
//!
//! Simple versioned migrations. Each migration transforms the schema from
//! version N to N+1.

use rusqlite::Connection;
use storage_access_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: calling it on an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated permission schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: permissions table.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Only Never (0) and Timed (2) records are ever written here.
        CREATE TABLE permissions (
            origin TEXT NOT NULL,              -- principal origin with attribute suffix
            type TEXT NOT NULL,                -- permission type / storage key
            capability INTEGER NOT NULL,       -- 0=default, 1=allow, 2=deny
            expire_type INTEGER NOT NULL,      -- 0=never, 2=timed
            expire_time INTEGER NOT NULL,      -- Unix ms, 0 when not timed
            PRIMARY KEY (origin, type)
        );
        "#,
    )?;
    Ok(())
}

/// Migration v2: modification time and an expiry index for the sweep.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE permissions ADD COLUMN modified_at INTEGER NOT NULL DEFAULT 0;
        CREATE INDEX idx_permissions_expiry ON permissions(expire_type, expire_time);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_schema_has_modified_column() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO permissions (origin, type, capability, expire_type, expire_time, modified_at)
             VALUES ('https://a.example', 'cookie', 1, 0, 0, 42)",
            [],
        )
        .unwrap();
    }
}
