//! # Storage Access
//!
//! The unified API of the storage-access engine: decide whether a context may
//! reach unpartitioned storage, and turn requests for access into durable
//! grants.
//!
//! ## Overview
//!
//! - **Evaluation** is synchronous and pure. [`PolicyEvaluator`] answers for a
//!   window, a network load, a window without a load, or a bare principal.
//! - **Grant requests** go through [`GrantCoordinator`], which re-derives the
//!   same topology, applies the interaction gate and an optional caller
//!   final check, then commits.
//! - **Commits** happen in the privileged process through
//!   [`DurableCommitter`]. A content process forwards them over a
//!   [`RemoteCoordinatorChannel`](storage_access_ipc::RemoteCoordinatorChannel).
//! - **Auto-grants** are session-scoped and force-expired after
//!   [`MAX_AUTO_GRANT_LIFETIME`] by [`AutoGrantExpiry`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storage_access::{
//!     DurableCommitter, EngineConfig, GrantCoordinator, ProcessRole, TracingNotifier,
//! };
//! use storage_access::core::GrantReason;
//!
//! async fn example(collaborators: storage_access::policy::Collaborators) {
//!     let config = EngineConfig::default();
//!     let committer = Arc::new(DurableCommitter::new(collaborators.store.clone(), &config));
//!     let coordinator = GrantCoordinator::new(
//!         collaborators,
//!         Arc::new(TracingNotifier),
//!         ProcessRole::Parent(committer),
//!         config,
//!     );
//!
//!     let outcome = coordinator
//!         .request_access_grant(&tracker, parent_context, GrantReason::StorageAccessApi, None)
//!         .await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `storage_access::core` - Principals, origins, decisions, permission records
//! - `storage_access::store` - Permission store trait, SQLite and in-memory stores
//! - `storage_access::policy` - Collaborator traits and the evaluator
//! - `storage_access::ipc` - Grant request protocol and in-memory transport

pub mod commit;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod expiry;
pub mod notifier;

// Re-export component crates
pub use storage_access_core as core;
pub use storage_access_ipc as ipc;
pub use storage_access_policy as policy;
pub use storage_access_store as store;

// Re-export main types for convenience
pub use commit::DurableCommitter;
pub use config::{EngineConfig, DEFAULT_STORAGE_ACCESS_EXPIRATION_SECS, MAX_AUTO_GRANT_LIFETIME};
pub use coordinator::{final_check, FinalCheck, GrantCoordinator, GrantOutcome, ProcessRole};
pub use error::{EngineError, GrantError, Result};
pub use expiry::AutoGrantExpiry;
pub use notifier::{BlockingDecision, ContentBlockingNotifier, TracingNotifier, TELEMETRY_TARGET};

// Re-export commonly used types
pub use storage_access_core::{
    AllowMode, BehaviorMode, Decision, GrantReason, Origin, PermissionKey, Principal,
    RejectedReason,
};
pub use storage_access_policy::{ChannelInfo, Collaborators, EvaluatorOptions, PolicyEvaluator};
