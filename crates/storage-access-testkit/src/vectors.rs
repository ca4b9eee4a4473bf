//! Decision vectors: named window scenarios with their expected decision.
//!
//! Each vector places one frame inside a top-level document and evaluates
//! the frame against its own origin.

use serde::Serialize;

use storage_access_core::{
    BehaviorMode, Capability, Decision, ExpiryKind, RejectedReason, COOKIE_PERMISSION_TYPE,
};
use storage_access_policy::Classification;
use storage_access_store::PermissionStore;

use crate::fixtures::{principal, FakeContextTree, TestFixture};

/// A decision vector.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub behavior: BehaviorMode,
    /// URL of the top-level document.
    pub top: &'static str,
    /// URL of the embedded frame, also the evaluated URI.
    pub frame: &'static str,
    pub classification: Classification,
    pub allow_listed: bool,
    pub sandboxed: bool,
    /// Explicit cookie permission stored for the frame's principal.
    pub cookie_override: Option<Capability>,
    pub expected: Decision,
}

const NEWS: &str = "https://news.example";
const TRACKER: &str = "https://tracker.test";

fn vector(name: &'static str, behavior: BehaviorMode, expected: Decision) -> DecisionVector {
    DecisionVector {
        name,
        behavior,
        top: NEWS,
        frame: TRACKER,
        classification: Classification::TRACKER,
        allow_listed: false,
        sandboxed: false,
        cookie_override: None,
        expected,
    }
}

/// Get all decision vectors.
pub fn all_vectors() -> Vec<DecisionVector> {
    use BehaviorMode::*;

    vec![
        vector("accept allows a tracker", Accept, Decision::allow()),
        vector("reject denies everything", Reject, Decision::deny(RejectedReason::All)),
        DecisionVector {
            allow_listed: true,
            ..vector("allow-list beats reject", Reject, Decision::allow())
        },
        vector(
            "reject-foreign denies a third party",
            RejectForeign,
            Decision::deny(RejectedReason::Foreign),
        ),
        vector(
            "limit-foreign denies a third party",
            LimitForeign,
            Decision::deny(RejectedReason::Foreign),
        ),
        DecisionVector {
            frame: "https://cdn.news.example",
            ..vector("reject-foreign allows a same-site frame", RejectForeign, Decision::allow())
        },
        vector(
            "reject-tracker denies a tracker",
            RejectTracker,
            Decision::deny(RejectedReason::Tracker),
        ),
        DecisionVector {
            classification: Classification::SOCIAL_TRACKER,
            ..vector(
                "reject-tracker reports a social tracker",
                RejectTracker,
                Decision::deny(RejectedReason::SocialTracker),
            )
        },
        DecisionVector {
            classification: Classification::NONE,
            ..vector("reject-tracker allows a plain third party", RejectTracker, Decision::allow())
        },
        vector(
            "partition denies a tracker",
            RejectTrackerAndPartitionForeign,
            Decision::deny(RejectedReason::Tracker),
        ),
        DecisionVector {
            classification: Classification::NONE,
            ..vector(
                "partition partitions a plain third party",
                RejectTrackerAndPartitionForeign,
                Decision::deny(RejectedReason::PartitionedForeign),
            )
        },
        DecisionVector {
            frame: "https://cdn.news.example",
            classification: Classification::NONE,
            ..vector(
                "partition allows a same-site frame",
                RejectTrackerAndPartitionForeign,
                Decision::allow(),
            )
        },
        DecisionVector {
            sandboxed: true,
            ..vector("sandboxed tracker has no reason", RejectTracker, Decision::deny_silently())
        },
        DecisionVector {
            cookie_override: Some(Capability::Allow),
            ..vector("cookie allow beats reject", Reject, Decision::allow())
        },
        DecisionVector {
            cookie_override: Some(Capability::Deny),
            ..vector(
                "cookie deny beats accept",
                Accept,
                Decision::deny(RejectedReason::ByPermission),
            )
        },
        DecisionVector {
            cookie_override: Some(Capability::Deny),
            allow_listed: true,
            ..vector(
                "cookie deny beats the allow-list",
                RejectTracker,
                Decision::deny(RejectedReason::ByPermission),
            )
        },
    ]
}

/// Evaluate a vector against a freshly built fixture.
pub fn evaluate_vector(vector: &DecisionVector) -> Decision {
    let mut builder = FakeContextTree::builder(vector.behavior);
    let top_principal = principal(vector.top);
    let top = builder.top(top_principal.clone());
    let frame_principal = principal(vector.frame);
    let frame = builder.frame(top, frame_principal.clone());
    builder.classify(frame, vector.classification);
    if vector.allow_listed {
        builder.allow_list_site(top_principal.origin().base_domain());
    }
    if vector.sandboxed {
        builder.sandbox(frame);
    }

    let fixture = TestFixture::new(builder.build());
    if let Some(capability) = vector.cookie_override {
        fixture
            .store
            .add(
                &frame_principal,
                COOKIE_PERMISSION_TYPE,
                capability,
                ExpiryKind::Never,
                0,
            )
            .expect("memory store write");
    }

    fixture
        .evaluator()
        .evaluate_window(frame.inner(), frame_principal.origin())
}

/// Evaluate every vector.
///
/// Returns (name, matches, actual decision) per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, Decision)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = evaluate_vector(v);
            (v.name.to_string(), actual == v.expected, actual)
        })
        .collect()
}

/// All vectors as pretty-printed JSON.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
