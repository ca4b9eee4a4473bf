//! # Storage Access Store
//!
//! Keyed storage of permission records. Provides a trait-based interface
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The evaluator only reads through [`PermissionStore`]; the durable commit
//! step is the only writer. Records are keyed by the principal's origin
//! (including origin attributes) and the permission type.
//!
//! ## Key Types
//!
//! - [`PermissionStore`] - The trait for all permission operations
//! - [`SqlitePermissionStore`] - SQLite-backed store with a session overlay
//! - [`MemoryPermissionStore`] - In-memory store for tests and ephemeral profiles
//!
//! ## Usage
//!
//! ```rust,no_run
//! use storage_access_core::{Capability, ExpiryKind, PermissionKey, Principal};
//! use storage_access_store::{PermissionStore, SqlitePermissionStore};
//!
//! let store = SqlitePermissionStore::open("permissions.sqlite").unwrap();
//! let top = Principal::from_url("https://news.example").unwrap();
//! let key = PermissionKey::for_origin("https://tracker.test");
//!
//! store
//!     .add(&top, key.as_str(), Capability::Allow, ExpiryKind::Session, 0)
//!     .unwrap();
//! assert_eq!(
//!     store.test_permission(&top, key.as_str()).unwrap(),
//!     Capability::Allow
//! );
//! ```
//!
//! ## Design Notes
//!
//! - **Last write wins**: adding an existing (principal, type) pair replaces it
//! - **Session records are never durable**: they live in memory only and are
//!   dropped by [`PermissionStore::end_session`]
//! - **Lapsed records are invisible**: a `Timed` record past its expiry tests
//!   as `Default` even before the sweep removes it

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryPermissionStore;
pub use sqlite::SqlitePermissionStore;
pub use traits::{PermissionStore, PermissionStoreExt};
