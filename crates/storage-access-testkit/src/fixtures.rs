//! Test fixtures and collaborator fakes.
//!
//! [`FakeContextTree`] models a frame tree where every frame has one browsing
//! context, one outer window and one current inner window, all sharing the
//! frame's number. It also answers as settings source, allow-list and
//! classifier, so a single value wires a whole scenario.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use storage_access::{
    BlockingDecision, ContentBlockingNotifier, DurableCommitter, EngineConfig, GrantCoordinator,
    ProcessRole,
};
use storage_access_core::{
    BehaviorMode, Capability, ExpiryKind, GrantReason, PermissionKey, PermissionRecord,
    Principal, RejectedReason,
};
use storage_access_policy::{
    AllowListChecker, BrowsingContextId, ChannelInfo, Classification, Collaborators,
    ContextTree, CookieJarSettings, EvaluatorOptions, InnerWindowId, InteractionRecord,
    OuterWindowId, PolicyEvaluator, SettingsSource, TrackerClassifier,
};
use storage_access_store::{MemoryPermissionStore, PermissionStore, StoreError};

/// Parse a URL into a content principal.
///
/// Panics on a malformed URL; fixtures only use literals.
pub fn principal(url: &str) -> Principal {
    Principal::from_url(url).expect("fixture URL must parse")
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame tree
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one frame of a [`FakeContextTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

impl FrameHandle {
    pub fn context(self) -> BrowsingContextId {
        BrowsingContextId(self.0)
    }

    pub fn outer(self) -> OuterWindowId {
        OuterWindowId(self.0)
    }

    pub fn inner(self) -> InnerWindowId {
        InnerWindowId(self.0)
    }
}

#[derive(Debug, Clone)]
struct Frame {
    parent: Option<u64>,
    principal: Option<Principal>,
    in_process: bool,
    classification: Classification,
    sandboxed: bool,
}

/// Builder for a [`FakeContextTree`].
#[derive(Debug)]
pub struct TreeBuilder {
    behavior: BehaviorMode,
    frames: BTreeMap<u64, Frame>,
    allow_listed_sites: HashSet<String>,
}

impl TreeBuilder {
    /// A top-level frame displaying a document of `principal`.
    pub fn top(&mut self, principal: Principal) -> FrameHandle {
        self.insert(None, Some(principal))
    }

    /// A child frame of `parent` displaying a document of `principal`.
    pub fn frame(&mut self, parent: FrameHandle, principal: Principal) -> FrameHandle {
        self.insert(Some(parent.0), Some(principal))
    }

    /// A child frame of `parent` with no document loaded.
    pub fn empty_frame(&mut self, parent: FrameHandle) -> FrameHandle {
        self.insert(Some(parent.0), None)
    }

    pub fn classify(&mut self, frame: FrameHandle, classification: Classification) -> &mut Self {
        if let Some(f) = self.frames.get_mut(&frame.0) {
            f.classification = classification;
        }
        self
    }

    pub fn sandbox(&mut self, frame: FrameHandle) -> &mut Self {
        if let Some(f) = self.frames.get_mut(&frame.0) {
            f.sandboxed = true;
        }
        self
    }

    /// Host the frame in another process.
    pub fn out_of_process(&mut self, frame: FrameHandle) -> &mut Self {
        if let Some(f) = self.frames.get_mut(&frame.0) {
            f.in_process = false;
        }
        self
    }

    /// Exempt every tree whose top-level site is `site` (a registrable
    /// domain).
    pub fn allow_list_site(&mut self, site: &str) -> &mut Self {
        self.allow_listed_sites.insert(site.to_string());
        self
    }

    pub fn build(self) -> FakeContextTree {
        FakeContextTree {
            behavior: self.behavior,
            frames: self.frames,
            allow_listed_sites: self.allow_listed_sites,
            granted: Mutex::new(HashMap::new()),
            notified: Mutex::new(Vec::new()),
            classifications: AtomicUsize::new(0),
        }
    }

    fn insert(&mut self, parent: Option<u64>, principal: Option<Principal>) -> FrameHandle {
        let id = self.frames.len() as u64 + 1;
        self.frames.insert(
            id,
            Frame {
                parent,
                principal,
                in_process: true,
                classification: Classification::NONE,
                sandboxed: false,
            },
        );
        FrameHandle(id)
    }
}

/// In-memory frame tree implementing every window-side collaborator.
#[derive(Debug)]
pub struct FakeContextTree {
    behavior: BehaviorMode,
    frames: BTreeMap<u64, Frame>,
    allow_listed_sites: HashSet<String>,
    granted: Mutex<HashMap<u64, HashSet<String>>>,
    notified: Mutex<Vec<InnerWindowId>>,
    classifications: AtomicUsize,
}

impl FakeContextTree {
    /// Start a tree whose every window uses `behavior`.
    pub fn builder(behavior: BehaviorMode) -> TreeBuilder {
        TreeBuilder {
            behavior,
            frames: BTreeMap::new(),
            allow_listed_sites: HashSet::new(),
        }
    }

    /// Windows told that storage access was granted to them, in order.
    pub fn notified_windows(&self) -> Vec<InnerWindowId> {
        self.notified.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Number of window classifications answered so far.
    pub fn classification_count(&self) -> usize {
        self.classifications.load(Ordering::SeqCst)
    }

    fn root(&self, id: u64) -> u64 {
        let mut current = id;
        while let Some(parent) = self.frames.get(&current).and_then(|f| f.parent) {
            current = parent;
        }
        current
    }

    fn root_principal(&self, id: u64) -> Option<Principal> {
        self.frames.get(&self.root(id))?.principal.clone()
    }

    fn in_process_top_of(&self, id: u64) -> Option<u64> {
        if !self.frames.get(&id)?.in_process {
            return None;
        }
        let mut current = id;
        while let Some(parent) = self.frames.get(&current).and_then(|f| f.parent) {
            match self.frames.get(&parent) {
                Some(f) if f.in_process => current = parent,
                _ => break,
            }
        }
        Some(current)
    }
}

impl ContextTree for FakeContextTree {
    fn outer_window(&self, context: BrowsingContextId) -> Option<OuterWindowId> {
        let frame = self.frames.get(&context.0)?;
        frame.in_process.then_some(OuterWindowId(context.0))
    }

    fn top(&self, context: BrowsingContextId) -> BrowsingContextId {
        BrowsingContextId(self.root(context.0))
    }

    fn is_in_process(&self, context: BrowsingContextId) -> bool {
        self.frames.get(&context.0).map(|f| f.in_process).unwrap_or(false)
    }

    fn current_inner_window(&self, outer: OuterWindowId) -> Option<InnerWindowId> {
        self.frames.get(&outer.0).map(|_| InnerWindowId(outer.0))
    }

    fn is_top_level(&self, outer: OuterWindowId) -> bool {
        self.frames
            .get(&outer.0)
            .map(|f| f.parent.is_none())
            .unwrap_or(false)
    }

    fn in_process_top(&self, outer: OuterWindowId) -> Option<OuterWindowId> {
        self.in_process_top_of(outer.0).map(OuterWindowId)
    }

    fn outer_of(&self, inner: InnerWindowId) -> Option<OuterWindowId> {
        self.frames.get(&inner.0).map(|_| OuterWindowId(inner.0))
    }

    fn browsing_context_of(&self, inner: InnerWindowId) -> Option<BrowsingContextId> {
        self.frames.get(&inner.0).map(|_| BrowsingContextId(inner.0))
    }

    fn parent(&self, inner: InnerWindowId) -> Option<InnerWindowId> {
        self.frames.get(&inner.0)?.parent.map(InnerWindowId)
    }

    fn document_principal(&self, inner: InnerWindowId) -> Option<Principal> {
        self.frames.get(&inner.0)?.principal.clone()
    }

    fn top_level_storage_area_principal(&self, inner: InnerWindowId) -> Option<Principal> {
        let parent = self.frames.get(&inner.0)?.parent?;
        if self.frames.get(&parent)?.parent.is_some() {
            return None;
        }
        self.frames.get(&parent)?.principal.clone()
    }

    fn top_level_anti_tracking_principal(&self, inner: InnerWindowId) -> Option<Principal> {
        self.root_principal(inner.0)
    }

    fn top_window(&self, inner: InnerWindowId) -> Option<OuterWindowId> {
        self.in_process_top_of(inner.0).map(OuterWindowId)
    }

    fn has_storage_access_granted(&self, top_inner: InnerWindowId, key: &PermissionKey) -> bool {
        self.granted
            .lock()
            .map(|g| {
                g.get(&top_inner.0)
                    .map(|keys| keys.contains(key.as_str()))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn save_storage_access_granted(&self, top_inner: InnerWindowId, key: &PermissionKey) {
        if let Ok(mut granted) = self.granted.lock() {
            granted
                .entry(top_inner.0)
                .or_default()
                .insert(key.as_str().to_string());
        }
    }

    fn storage_access_granted(&self, inner: InnerWindowId) {
        if let Ok(mut notified) = self.notified.lock() {
            notified.push(inner);
        }
    }
}

impl SettingsSource for FakeContextTree {
    fn cookie_jar_settings(&self, _window: InnerWindowId) -> CookieJarSettings {
        CookieJarSettings::new(self.behavior)
    }

    fn is_storage_sandboxed(&self, window: InnerWindowId) -> bool {
        self.frames.get(&window.0).map(|f| f.sandboxed).unwrap_or(false)
    }
}

impl AllowListChecker for FakeContextTree {
    fn check_window(&self, window: InnerWindowId) -> bool {
        self.root_principal(window.0)
            .map(|p| self.allow_listed_sites.contains(p.origin().base_domain()))
            .unwrap_or(false)
    }

    fn check_channel(&self, channel: &ChannelInfo) -> bool {
        channel
            .resolve_top_level_principal()
            .map(|p| self.allow_listed_sites.contains(p.origin().base_domain()))
            .unwrap_or(false)
    }
}

impl TrackerClassifier for FakeContextTree {
    fn classify_window(&self, window: InnerWindowId) -> Classification {
        self.classifications.fetch_add(1, Ordering::SeqCst);
        self.frames
            .get(&window.0)
            .map(|f| f.classification)
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interaction history and telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// Origins the user has interacted with.
#[derive(Debug, Default)]
pub struct InteractionSet {
    origins: Mutex<HashSet<String>>,
}

impl InteractionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, principal: &Principal) {
        if let Ok(mut origins) = self.origins.lock() {
            origins.insert(principal.origin().ascii_serialization());
        }
    }
}

impl InteractionRecord for InteractionSet {
    fn exists(&self, principal: &Principal) -> bool {
        self.origins
            .lock()
            .map(|o| o.contains(&principal.origin().ascii_serialization()))
            .unwrap_or(false)
    }
}

/// One event captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Decision {
        window: InnerWindowId,
        decision: BlockingDecision,
        reason: RejectedReason,
    },
    Event {
        top_window: OuterWindowId,
        tracking_origin: String,
        reason: RejectedReason,
        grant_reason: GrantReason,
    },
    Unblocking {
        parent_window: InnerWindowId,
        tracking_origin: String,
        grant_reason: GrantReason,
    },
}

/// Notifier that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: NotifierEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ContentBlockingNotifier for RecordingNotifier {
    fn on_decision(&self, window: InnerWindowId, decision: BlockingDecision, reason: RejectedReason) {
        self.push(NotifierEvent::Decision {
            window,
            decision,
            reason,
        });
    }

    fn on_event(
        &self,
        top_window: OuterWindowId,
        tracking_origin: &str,
        reason: RejectedReason,
        grant_reason: GrantReason,
    ) {
        self.push(NotifierEvent::Event {
            top_window,
            tracking_origin: tracking_origin.to_string(),
            reason,
            grant_reason,
        });
    }

    fn report_unblocking(
        &self,
        parent_window: InnerWindowId,
        tracking_origin: &str,
        grant_reason: GrantReason,
    ) {
        self.push(NotifierEvent::Unblocking {
            parent_window,
            tracking_origin: tracking_origin.to_string(),
            grant_reason,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

/// Bundle a fake tree, interaction history and store as [`Collaborators`].
pub fn collaborators(
    tree: Arc<FakeContextTree>,
    interactions: Arc<InteractionSet>,
    store: Arc<dyn PermissionStore>,
) -> Collaborators {
    Collaborators {
        tree: tree.clone(),
        settings: tree.clone(),
        allow_list: tree.clone(),
        classifier: tree,
        interactions,
        store,
    }
}

/// A frame tree with an in-memory store, interaction history and notifier.
pub struct TestFixture {
    pub tree: Arc<FakeContextTree>,
    pub interactions: Arc<InteractionSet>,
    pub store: Arc<MemoryPermissionStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestFixture {
    pub fn new(tree: FakeContextTree) -> Self {
        Self {
            tree: Arc::new(tree),
            interactions: Arc::new(InteractionSet::new()),
            store: Arc::new(MemoryPermissionStore::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        collaborators(
            self.tree.clone(),
            self.interactions.clone(),
            self.store.clone(),
        )
    }

    pub fn evaluator(&self) -> PolicyEvaluator {
        PolicyEvaluator::new(self.collaborators(), EvaluatorOptions::default())
    }

    /// A coordinator that commits straight into the fixture's store.
    pub fn parent_coordinator(&self, config: EngineConfig) -> GrantCoordinator {
        let committer = Arc::new(DurableCommitter::new(self.store.clone(), &config));
        self.coordinator(ProcessRole::Parent(committer), config)
    }

    pub fn coordinator(&self, role: ProcessRole, config: EngineConfig) -> GrantCoordinator {
        GrantCoordinator::new(self.collaborators(), self.notifier.clone(), role, config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failing store
// ─────────────────────────────────────────────────────────────────────────────

/// A memory store whose reads or writes can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryPermissionStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    add_attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `add` calls, failed ones included.
    pub fn add_attempts(&self) -> usize {
        self.add_attempts.load(Ordering::SeqCst)
    }

    /// The backing store, bypassing any injected failure.
    pub fn inner(&self) -> &MemoryPermissionStore {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> storage_access_store::Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::InvalidData("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl PermissionStore for FailingStore {
    fn test_permission(
        &self,
        principal: &Principal,
        permission_type: &str,
    ) -> storage_access_store::Result<Capability> {
        Self::check(&self.fail_reads)?;
        self.inner.test_permission(principal, permission_type)
    }

    fn scan_for_principal(
        &self,
        principal: &Principal,
    ) -> storage_access_store::Result<Vec<PermissionRecord>> {
        Self::check(&self.fail_reads)?;
        self.inner.scan_for_principal(principal)
    }

    fn add(
        &self,
        principal: &Principal,
        permission_type: &str,
        capability: Capability,
        expire_kind: ExpiryKind,
        expires_at: i64,
    ) -> storage_access_store::Result<()> {
        self.add_attempts.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_writes)?;
        self.inner
            .add(principal, permission_type, capability, expire_kind, expires_at)
    }

    fn remove(&self, principal: &Principal, permission_type: &str) -> storage_access_store::Result<bool> {
        Self::check(&self.fail_writes)?;
        self.inner.remove(principal, permission_type)
    }

    fn remove_expired(&self, now: i64) -> storage_access_store::Result<usize> {
        Self::check(&self.fail_writes)?;
        self.inner.remove_expired(now)
    }

    fn end_session(&self) -> storage_access_store::Result<usize> {
        Self::check(&self.fail_writes)?;
        self.inner.end_session()
    }
}

/// The common shape: `news.example` embedding a `tracker.test` frame.
///
/// Returns the tree and the (top, frame) handles. The frame is classified
/// with `classification`.
pub fn tracker_in_news(
    behavior: BehaviorMode,
    classification: Classification,
) -> (FakeContextTree, FrameHandle, FrameHandle) {
    let mut builder = FakeContextTree::builder(behavior);
    let top = builder.top(principal("https://news.example"));
    let frame = builder.frame(top, principal("https://tracker.test"));
    builder.classify(frame, classification);
    (builder.build(), top, frame)
}
