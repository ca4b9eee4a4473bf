//! Proptest generators for property-based testing.

use proptest::prelude::*;

use storage_access_core::{BehaviorMode, Capability, Principal};
use storage_access_policy::Classification;

use crate::fixtures::{principal, FakeContextTree, FrameHandle};

const TOP_SITES: &[&str] = &[
    "https://news.example",
    "https://www.shop.example",
    "http://blog.example.co.uk",
];

const FRAME_SITES: &[&str] = &[
    "https://tracker.test",
    "https://social.example",
    "https://cdn.news.example",
    "https://news.example",
    "https://ads.example.co.uk",
];

/// Generate a behavior mode.
pub fn behavior_mode() -> impl Strategy<Value = BehaviorMode> {
    prop::sample::select(BehaviorMode::ALL.to_vec())
}

/// Generate a classifier verdict.
pub fn classification() -> impl Strategy<Value = Classification> {
    prop_oneof![
        Just(Classification::NONE),
        Just(Classification::TRACKER),
        Just(Classification::SOCIAL_TRACKER),
    ]
}

/// Generate an explicit override capability.
pub fn explicit_capability() -> impl Strategy<Value = Capability> {
    prop_oneof![Just(Capability::Allow), Just(Capability::Deny)]
}

/// Generate a content principal, private or not.
pub fn content_principal() -> impl Strategy<Value = Principal> {
    (prop::sample::select(FRAME_SITES.to_vec()), 0u32..=1)
        .prop_map(|(url, pb)| principal(url).with_private_browsing_id(pb))
}

/// A top-level document embedding one frame.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub behavior: BehaviorMode,
    pub top: &'static str,
    pub frame: &'static str,
    pub classification: Classification,
    pub allow_listed: bool,
    pub sandboxed: bool,
}

impl Scenario {
    /// Build the tree. Returns it with the frame's handle.
    pub fn build(&self) -> (FakeContextTree, FrameHandle) {
        let mut builder = FakeContextTree::builder(self.behavior);
        let top_principal = principal(self.top);
        let top = builder.top(top_principal.clone());
        let frame = builder.frame(top, principal(self.frame));
        builder.classify(frame, self.classification);
        if self.allow_listed {
            builder.allow_list_site(top_principal.origin().base_domain());
        }
        if self.sandboxed {
            builder.sandbox(frame);
        }
        (builder.build(), frame)
    }

    pub fn frame_principal(&self) -> Principal {
        principal(self.frame)
    }
}

impl Arbitrary for Scenario {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            behavior_mode(),
            prop::sample::select(TOP_SITES.to_vec()),
            prop::sample::select(FRAME_SITES.to_vec()),
            classification(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(
                |(behavior, top, frame, classification, allow_listed, sandboxed)| Scenario {
                    behavior,
                    top,
                    frame,
                    classification,
                    allow_listed,
                    sandboxed,
                },
            )
            .boxed()
    }
}
