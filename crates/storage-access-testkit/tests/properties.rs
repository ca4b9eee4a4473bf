//! Property tests over generated frame scenarios.

use proptest::prelude::*;

use storage_access_core::{
    BehaviorMode, Capability, Decision, ExpiryKind, RejectedReason, COOKIE_PERMISSION_TYPE,
};
use storage_access_policy::CookieJarSettings;
use storage_access_store::PermissionStore;
use storage_access_testkit::generators::{
    behavior_mode, content_principal, explicit_capability, Scenario,
};
use storage_access_testkit::TestFixture;

fn expected_override(capability: Capability) -> Decision {
    match capability {
        Capability::Allow => Decision::allow(),
        _ => Decision::deny(RejectedReason::ByPermission),
    }
}

proptest! {
    #[test]
    fn cookie_override_decides(scenario: Scenario, capability in explicit_capability()) {
        let (tree, frame) = scenario.build();
        let fixture = TestFixture::new(tree);
        let subject = scenario.frame_principal();
        fixture
            .store
            .add(&subject, COOKIE_PERMISSION_TYPE, capability, ExpiryKind::Never, 0)
            .unwrap();

        let decision = fixture.evaluator().evaluate_window(frame.inner(), subject.origin());
        prop_assert_eq!(decision, expected_override(capability));
    }

    #[test]
    fn accept_always_allows(mut scenario: Scenario) {
        scenario.behavior = BehaviorMode::Accept;
        let (tree, frame) = scenario.build();
        let fixture = TestFixture::new(tree);

        let decision = fixture
            .evaluator()
            .evaluate_window(frame.inner(), scenario.frame_principal().origin());
        prop_assert_eq!(decision, Decision::allow());
    }

    #[test]
    fn reject_denies_with_all(mut scenario: Scenario) {
        scenario.behavior = BehaviorMode::Reject;
        scenario.allow_listed = false;
        let (tree, frame) = scenario.build();
        let fixture = TestFixture::new(tree);

        let decision = fixture
            .evaluator()
            .evaluate_window(frame.inner(), scenario.frame_principal().origin());
        prop_assert_eq!(decision, Decision::deny(RejectedReason::All));
    }

    #[test]
    fn allow_listed_always_allows(mut scenario: Scenario) {
        scenario.allow_listed = true;
        let (tree, frame) = scenario.build();
        let fixture = TestFixture::new(tree);

        let decision = fixture
            .evaluator()
            .evaluate_window(frame.inner(), scenario.frame_principal().origin());
        prop_assert_eq!(decision, Decision::allow());
    }

    #[test]
    fn evaluation_is_pure(scenario: Scenario) {
        let (tree, frame) = scenario.build();
        let fixture = TestFixture::new(tree);
        let evaluator = fixture.evaluator();
        let uri = scenario.frame_principal().origin().clone();

        let first = evaluator.evaluate_window(frame.inner(), &uri);
        for _ in 0..3 {
            prop_assert_eq!(evaluator.evaluate_window(frame.inner(), &uri), first);
        }
        prop_assert!(fixture.store.is_empty());
    }

    #[test]
    fn principal_override_decides(
        subject in content_principal(),
        behavior in behavior_mode(),
        capability in explicit_capability(),
    ) {
        let (tree, _) = Scenario {
            behavior,
            top: "https://news.example",
            frame: "https://tracker.test",
            classification: Default::default(),
            allow_listed: false,
            sandboxed: false,
        }
        .build();
        let fixture = TestFixture::new(tree);
        fixture
            .store
            .add(&subject, COOKIE_PERMISSION_TYPE, capability, ExpiryKind::Never, 0)
            .unwrap();

        let decision = fixture
            .evaluator()
            .evaluate_principal(&subject, &CookieJarSettings::new(behavior));
        prop_assert_eq!(decision, expected_override(capability));
    }
}
