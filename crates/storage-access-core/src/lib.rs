//! # Storage Access Core
//!
//! Pure primitives shared by every part of the storage-access policy engine.
//!
//! This crate contains no I/O, no storage, no networking. It defines the
//! vocabulary the evaluator, the permission store and the grant coordinator
//! speak to each other.
//!
//! ## Key Types
//!
//! - [`Origin`] - Canonical `scheme://host[:port]` identity of a security context
//! - [`Principal`] - An origin plus its private-browsing and extension attributes
//! - [`PermissionKey`] - The permission type under which a storage grant is recorded
//! - [`BehaviorMode`] - The configured cookie behaviour
//! - [`Decision`] / [`RejectedReason`] - The outcome of an evaluation
//! - [`PermissionRecord`] - A stored capability with its expiry policy

pub mod clock;
pub mod decision;
pub mod error;
pub mod mode;
pub mod permission;
pub mod types;

pub use clock::now_millis;
pub use decision::{Decision, RejectedReason};
pub use error::{CoreError, Result};
pub use mode::BehaviorMode;
pub use permission::{
    AllowMode, Capability, ExpiryKind, GrantReason, PermissionRecord, COOKIE_PERMISSION_TYPE,
};
pub use types::{Origin, PermissionKey, Principal, PrincipalKind, EXTENSION_SCHEME};
