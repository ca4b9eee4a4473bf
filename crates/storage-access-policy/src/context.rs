//! The host frame tree, as seen by the engine.
//!
//! Every relation the evaluator and the grant coordinator need is an explicit
//! query on [`ContextTree`]. Missing links are `None`, never a panic; what a
//! missing link means is decided by the caller, step by step.

use storage_access_core::{PermissionKey, Principal};

use crate::ids::{BrowsingContextId, InnerWindowId, OuterWindowId};

/// Read and annotate the host's window / document / browsing-context graph.
///
/// Implementations synchronize internally; the engine calls these from
/// concurrent evaluations.
pub trait ContextTree: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Browsing contexts
    // ─────────────────────────────────────────────────────────────────────────

    /// The outer window hosted by a browsing context, if it lives in this
    /// process.
    fn outer_window(&self, context: BrowsingContextId) -> Option<OuterWindowId>;

    /// The top browsing context of the tree `context` belongs to.
    fn top(&self, context: BrowsingContextId) -> BrowsingContextId;

    /// Whether the browsing context is hosted by this process.
    fn is_in_process(&self, context: BrowsingContextId) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Outer windows
    // ─────────────────────────────────────────────────────────────────────────

    /// The inner window currently displayed by an outer window.
    fn current_inner_window(&self, outer: OuterWindowId) -> Option<InnerWindowId>;

    /// Whether the outer window is the top-level window of its tree.
    fn is_top_level(&self, outer: OuterWindowId) -> bool;

    /// The topmost ancestor outer window that lives in this process.
    fn in_process_top(&self, outer: OuterWindowId) -> Option<OuterWindowId>;

    // ─────────────────────────────────────────────────────────────────────────
    // Inner windows
    // ─────────────────────────────────────────────────────────────────────────

    /// The outer window an inner window belongs to.
    fn outer_of(&self, inner: InnerWindowId) -> Option<OuterWindowId>;

    /// The browsing context an inner window belongs to.
    fn browsing_context_of(&self, inner: InnerWindowId) -> Option<BrowsingContextId>;

    /// The inner window of the parent frame, if any.
    fn parent(&self, inner: InnerWindowId) -> Option<InnerWindowId>;

    /// The principal of the window's document. `None` when there is no
    /// document.
    fn document_principal(&self, inner: InnerWindowId) -> Option<Principal>;

    /// Storage principal of the top document when the window is a
    /// singly-nested third-party frame. `None` for deeper nesting.
    fn top_level_storage_area_principal(&self, inner: InnerWindowId) -> Option<Principal>;

    /// Principal of the top-level document, regardless of nesting depth.
    fn top_level_anti_tracking_principal(&self, inner: InnerWindowId) -> Option<Principal>;

    /// The outer window at the top of the tree reachable from `inner`.
    fn top_window(&self, inner: InnerWindowId) -> Option<OuterWindowId>;

    // ─────────────────────────────────────────────────────────────────────────
    // Per-window storage-access cache
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the top inner window already recorded a grant for `key` this
    /// session.
    fn has_storage_access_granted(&self, top_inner: InnerWindowId, key: &PermissionKey) -> bool;

    /// Record a grant for `key` on the top inner window.
    fn save_storage_access_granted(&self, top_inner: InnerWindowId, key: &PermissionKey);

    /// Tell a window that storage access was just granted to it.
    fn storage_access_granted(&self, inner: InnerWindowId);
}
