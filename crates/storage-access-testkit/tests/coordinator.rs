//! Grant coordinator pipeline: gates, rejections, commit order and the
//! evaluator round trip.

use std::time::Duration;

use storage_access::{
    AllowMode, BlockingDecision, EngineConfig, FinalCheck, GrantError, GrantOutcome,
    MAX_AUTO_GRANT_LIFETIME,
};
use storage_access_core::{
    BehaviorMode, Capability, Decision, ExpiryKind, GrantReason, Origin, PermissionKey,
    RejectedReason,
};
use storage_access_policy::{BrowsingContextId, Classification, ContextTree};
use storage_access_store::{PermissionStore, PermissionStoreExt};
use storage_access_testkit::{
    principal, tracker_in_news, FakeContextTree, NotifierEvent, TestFixture,
};

fn tracker_key() -> PermissionKey {
    PermissionKey::for_origin("https://tracker.test")
}

fn tracker_uri() -> Origin {
    Origin::parse("https://tracker.test").unwrap()
}

fn final_check(mode: AllowMode) -> Option<FinalCheck> {
    Some(storage_access::final_check(move || async move {
        Ok::<_, anyhow::Error>(mode)
    }))
}

fn failing_check() -> Option<FinalCheck> {
    Some(storage_access::final_check(|| async {
        Err::<AllowMode, _>(anyhow::anyhow!("user dismissed the prompt"))
    }))
}

#[tokio::test]
async fn tracker_grant_commits_and_round_trips() {
    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());
    let tracker = principal("https://tracker.test");

    assert_eq!(
        coordinator
            .evaluator()
            .evaluate_window(frame.inner(), &tracker_uri()),
        Decision::deny(RejectedReason::Tracker)
    );

    let outcome = coordinator
        .request_access_grant(
            &tracker,
            frame.context(),
            GrantReason::StorageAccessApi,
            final_check(AllowMode::OneShot),
        )
        .await
        .unwrap();
    // A local commit resolves to Allow whatever mode the final check picked.
    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));

    let news = principal("https://news.example");
    let records = fixture.store.scan_for_principal(&news).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].permission_type, tracker_key().as_str());
    assert_eq!(records[0].capability, Capability::Allow);
    assert_eq!(records[0].expire_kind, ExpiryKind::Timed);

    assert!(fixture.tree.has_storage_access_granted(top.inner(), &tracker_key()));
    assert_eq!(fixture.tree.notified_windows(), vec![frame.inner()]);

    assert_eq!(
        coordinator
            .evaluator()
            .evaluate_window(frame.inner(), &tracker_uri()),
        Decision::allow()
    );

    // The top-window marker alone keeps access for the rest of the session.
    fixture.store.remove(&news, tracker_key().as_str()).unwrap();
    assert_eq!(
        coordinator
            .evaluator()
            .evaluate_window(frame.inner(), &tracker_uri()),
        Decision::allow()
    );
}

#[tokio::test]
async fn commit_emits_telemetry_in_order() {
    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        fixture.notifier.events(),
        vec![
            NotifierEvent::Event {
                top_window: top.outer(),
                tracking_origin: "https://tracker.test".into(),
                reason: RejectedReason::Tracker,
                grant_reason: GrantReason::StorageAccessApi,
            },
            NotifierEvent::Unblocking {
                parent_window: frame.inner(),
                tracking_origin: "https://tracker.test".into(),
                grant_reason: GrantReason::StorageAccessApi,
            },
        ]
    );
}

#[tokio::test]
async fn opener_grant_from_first_party() {
    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    // news.example opened a tracker popup.
    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test/login"),
            top.context(),
            GrantReason::Opener,
            final_check(AllowMode::AllowAutoGrant),
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));

    let news = principal("https://news.example");
    assert!(fixture.store.has_storage_access(&news, &tracker_key()).unwrap());
    assert_eq!(
        coordinator
            .evaluator()
            .evaluate_window(frame.inner(), &tracker_uri()),
        Decision::allow()
    );
}

#[tokio::test]
async fn partition_mode_grants_plain_third_party() {
    let (tree, _top, frame) = tracker_in_news(
        BehaviorMode::RejectTrackerAndPartitionForeign,
        Classification::NONE,
    );
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            final_check(AllowMode::Allow),
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));
    assert_eq!(
        coordinator
            .evaluator()
            .evaluate_window(frame.inner(), &tracker_uri()),
        Decision::allow()
    );
}

#[tokio::test]
async fn nested_frame_grant_uses_anti_tracking_principal() {
    let mut builder = FakeContextTree::builder(BehaviorMode::RejectTrackerAndPartitionForeign);
    let top = builder.top(principal("https://news.example"));
    let middle = builder.frame(top, principal("https://widgets.example"));
    let nested = builder.frame(middle, principal("https://tracker.test"));
    let fixture = TestFixture::new(builder.build());
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            nested.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap();

    assert!(fixture
        .store
        .has_storage_access(&principal("https://news.example"), &tracker_key())
        .unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// Short circuits
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn accept_mode_needs_no_grant() {
    let (tree, _top, frame) = tracker_in_news(BehaviorMode::Accept, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            final_check(AllowMode::Allow),
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::AlreadyAllowed);
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn allow_listed_parent_needs_no_grant() {
    let mut builder = FakeContextTree::builder(BehaviorMode::RejectTracker);
    let top = builder.top(principal("https://news.example"));
    let frame = builder.frame(top, principal("https://tracker.test"));
    builder.classify(frame, Classification::TRACKER);
    builder.allow_list_site("news.example");
    let fixture = TestFixture::new(builder.build());
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::AlreadyAllowed);
    assert!(fixture.store.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Rejections
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn disabled_heuristic_is_policy_gate_without_telemetry() {
    let (tree, top, _frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let config = EngineConfig {
        heuristic_window_open: false,
        ..EngineConfig::default()
    };
    let coordinator = fixture.parent_coordinator(config);

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            top.context(),
            GrantReason::Opener,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::PolicyGate(GrantReason::Opener)));
    assert!(fixture.notifier.events().is_empty());
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn unknown_parent_context_is_a_resolution_error() {
    let (tree, _top, _frame) =
        tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            BrowsingContextId(404),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::ContextResolution(_)));
}

#[tokio::test]
async fn non_tracking_third_party_is_not_granted_under_reject_tracker() {
    let (tree, _top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::NONE);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::NotThirdParty));
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn sandboxed_parent_is_rejected() {
    let mut builder = FakeContextTree::builder(BehaviorMode::RejectTracker);
    let top = builder.top(principal("https://news.example"));
    let frame = builder.frame(top, principal("https://tracker.test"));
    builder
        .classify(frame, Classification::TRACKER)
        .sandbox(frame);
    let fixture = TestFixture::new(builder.build());
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::Sandboxed));
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn interaction_required_rejects_without_writing() {
    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let config = EngineConfig {
        user_interaction_required_for_hosts: vec!["tracker.test".into()],
        ..EngineConfig::default()
    };
    let coordinator = fixture.parent_coordinator(config);

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            final_check(AllowMode::Allow),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, GrantError::InteractionRequired { ref origin } if origin == "https://tracker.test")
    );
    assert!(fixture.store.is_empty());
    assert!(!fixture
        .tree
        .has_storage_access_granted(top.inner(), &tracker_key()));
    assert_eq!(
        fixture.notifier.events(),
        vec![NotifierEvent::Decision {
            window: frame.inner(),
            decision: BlockingDecision::Block,
            reason: RejectedReason::Tracker,
        }]
    );
}

#[tokio::test]
async fn recorded_interaction_passes_the_gate() {
    let (tree, _top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    fixture.interactions.record(&principal("https://tracker.test"));
    let config = EngineConfig {
        user_interaction_required_for_hosts: vec!["*.tracker.test".into()],
        ..EngineConfig::default()
    };
    let coordinator = fixture.parent_coordinator(config);

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));
}

#[tokio::test]
async fn interaction_confirmed_reason_bypasses_the_gate() {
    let (tree, _top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let config = EngineConfig {
        user_interaction_required_for_hosts: vec!["tracker.test".into()],
        ..EngineConfig::default()
    };
    let coordinator = fixture.parent_coordinator(config);

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::OpenerAfterUserInteraction,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));
}

#[tokio::test]
async fn failed_final_check_writes_nothing() {
    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    let err = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            failing_check(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GrantError::FinalCheckRejected));
    assert!(fixture.store.is_empty());
    assert!(!fixture
        .tree
        .has_storage_access_granted(top.inner(), &tracker_key()));
    assert!(fixture.notifier.events().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Expiry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn auto_grant_is_removed_after_ceiling() {
    let (tree, _top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let coordinator = fixture.parent_coordinator(EngineConfig::default());
    let news = principal("https://news.example");

    coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::Opener,
            final_check(AllowMode::AllowAutoGrant),
        )
        .await
        .unwrap();

    let records = fixture.store.scan_for_principal(&news).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].expire_kind, ExpiryKind::Session);

    tokio::time::sleep(MAX_AUTO_GRANT_LIFETIME + Duration::from_secs(1)).await;
    assert!(!fixture.store.has_storage_access(&news, &tracker_key()).unwrap());
}

#[tokio::test]
async fn private_session_grant_is_session_scoped() {
    let mut builder = FakeContextTree::builder(BehaviorMode::RejectTracker);
    let news = principal("https://news.example").with_private_browsing_id(1);
    let top = builder.top(news.clone());
    let frame = builder.frame(top, principal("https://tracker.test").with_private_browsing_id(1));
    builder.classify(frame, Classification::TRACKER);
    let fixture = TestFixture::new(builder.build());
    let coordinator = fixture.parent_coordinator(EngineConfig::default());

    coordinator
        .request_access_grant(
            &principal("https://tracker.test").with_private_browsing_id(1),
            frame.context(),
            GrantReason::StorageAccessApi,
            final_check(AllowMode::Allow),
        )
        .await
        .unwrap();

    let records = fixture.store.scan_for_principal(&news).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].expire_kind, ExpiryKind::Session);
    assert_eq!(records[0].expires_at, 0);
}

#[tokio::test]
async fn tracing_notifier_drives_a_full_grant() {
    use std::sync::Arc;

    use storage_access::{DurableCommitter, GrantCoordinator, ProcessRole, TracingNotifier};
    use tracing_subscriber::util::SubscriberInitExt;

    let _guard = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .set_default();

    let (tree, top, frame) = tracker_in_news(BehaviorMode::RejectTracker, Classification::TRACKER);
    let fixture = TestFixture::new(tree);
    let config = EngineConfig::default();
    let committer = Arc::new(DurableCommitter::new(fixture.store.clone(), &config));
    let coordinator = GrantCoordinator::new(
        fixture.collaborators(),
        Arc::new(TracingNotifier),
        ProcessRole::Parent(committer),
        config,
    );

    let outcome = coordinator
        .request_access_grant(
            &principal("https://tracker.test"),
            frame.context(),
            GrantReason::StorageAccessApi,
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome, GrantOutcome::Granted(AllowMode::Allow));
    assert!(fixture.tree.has_storage_access_granted(top.inner(), &tracker_key()));
    assert!(fixture.notifier.events().is_empty());
}
