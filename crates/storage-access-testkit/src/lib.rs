//! # Storage Access Testkit
//!
//! Testing utilities for the storage-access engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory frame tree that answers for every window-side
//!   collaborator, an interaction history and a recording notifier
//! - **Decision vectors**: named scenarios with their expected decision
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Decision Vectors
//!
//! ```rust
//! use storage_access_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, decision) in verify_all_vectors() {
//!     assert!(matches, "{name}: got {decision}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use storage_access_testkit::generators::Scenario;
//! use storage_access_testkit::fixtures::TestFixture;
//!
//! proptest! {
//!     #[test]
//!     fn evaluation_is_pure(scenario: Scenario) {
//!         let (tree, frame) = scenario.build();
//!         let evaluator = TestFixture::new(tree).evaluator();
//!         let uri = scenario.frame_principal().origin().clone();
//!         prop_assert_eq!(
//!             evaluator.evaluate_window(frame.inner(), &uri),
//!             evaluator.evaluate_window(frame.inner(), &uri)
//!         );
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use storage_access_testkit::fixtures::{tracker_in_news, TestFixture};
//! use storage_access_core::BehaviorMode;
//! use storage_access_policy::Classification;
//!
//! let (tree, _top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
//! let fixture = TestFixture::new(tree);
//! let uri = storage_access_core::Origin::parse("https://tracker.test").unwrap();
//! assert!(!fixture.evaluator().evaluate_window(frame.inner(), &uri).allowed);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    principal, tracker_in_news, FailingStore, FakeContextTree, FrameHandle, InteractionSet, NotifierEvent,
    RecordingNotifier, TestFixture, TreeBuilder,
};
