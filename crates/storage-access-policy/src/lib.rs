//! # Storage Access Policy
//!
//! Decides whether a context may reach unpartitioned storage.
//!
//! ## Overview
//!
//! The host's window/document/frame graph is never traversed directly.
//! Everything the decision needs is an explicit capability:
//!
//! - [`ContextTree`] - window, document and browsing-context relations, plus
//!   the per-window storage-access cache
//! - [`SettingsSource`] - cookie-jar settings and sandbox flags
//! - [`AllowListChecker`] - global exemptions
//! - [`TrackerClassifier`] - tracking / social-tracking verdicts
//! - [`InteractionRecord`] - prior user interaction
//! - [`PermissionStore`](storage_access_store::PermissionStore) - stored grants
//!   and cookie overrides
//!
//! [`PolicyEvaluator`] combines them into a [`Decision`](storage_access_core::Decision)
//! for a window, a network load ([`ChannelInfo`]), a window without a load,
//! or a bare principal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storage_access_policy::{Collaborators, EvaluatorOptions, PolicyEvaluator};
//!
//! let evaluator = PolicyEvaluator::new(collaborators, EvaluatorOptions::default());
//! let decision = evaluator.evaluate_window(window, &uri);
//! if !decision.allowed {
//!     // partition or block storage, report decision.rejected_reason
//! }
//! ```
//!
//! ## Design Notes
//!
//! - Evaluation never fails. Each step folds its own failure into a decision,
//!   and a few channel steps fail open on purpose.
//! - Mode handling is one exhaustive match per entry point over
//!   [`BehaviorMode`](storage_access_core::BehaviorMode).

pub mod channel;
pub mod collaborators;
pub mod context;
pub mod evaluator;
pub mod ids;
pub mod topology;

pub use channel::{ChannelInfo, ThirdPartyVerdict};
pub use collaborators::{
    AllowListChecker, Classification, Collaborators, CookieJarSettings, InteractionRecord,
    SettingsSource, TrackerClassifier,
};
pub use context::ContextTree;
pub use evaluator::{EvaluatorOptions, PolicyEvaluator};
pub use ids::{BrowsingContextId, InnerWindowId, OuterWindowId};
pub use topology::TrackingContext;
