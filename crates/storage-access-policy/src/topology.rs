//! First-party / third-party topology derived from a [`ContextTree`].

use storage_access_core::{BehaviorMode, Origin, Principal};

use crate::channel::{ChannelInfo, ThirdPartyVerdict};
use crate::collaborators::TrackerClassifier;
use crate::context::ContextTree;
use crate::ids::InnerWindowId;

/// Principals and origin that identify a storage-access grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingContext {
    /// Principal of the containing top-level site. Grants are stored on it.
    pub top_level_principal: Principal,
    /// Principal of the third-party window.
    pub tracking_principal: Principal,
    /// Origin of the tracking principal, without attribute suffix.
    pub tracking_origin: String,
}

/// Resolve the current inner window of the top of `inner`'s tree.
///
/// An out-of-process top is replaced by the nearest in-process ancestor when
/// `out_of_process_fallback` is set. That stand-in is known to be wrong for
/// cross-process trees and is kept only because existing behaviour relies on
/// it.
pub fn resolve_top_inner(
    tree: &dyn ContextTree,
    inner: InnerWindowId,
    out_of_process_fallback: bool,
) -> Option<InnerWindowId> {
    let context = tree.browsing_context_of(inner)?;
    let top = tree.top(context);

    let top_outer = if tree.is_in_process(top) {
        tree.outer_window(top)
    } else if out_of_process_fallback {
        let outer = tree.outer_of(inner)?;
        tracing::debug!(window = %inner, "top frame is out of process, using in-process top");
        tree.in_process_top(outer)
    } else {
        None
    };

    tree.current_inner_window(top_outer?)
}

/// Whether a window is third-party to anything above it, or to `uri`.
///
/// Sites are compared by registrable domain. A window without a document,
/// or with an ancestor lacking one, counts as third-party.
pub fn is_third_party_window(
    tree: &dyn ContextTree,
    inner: InnerWindowId,
    uri: Option<&Origin>,
) -> bool {
    let Some(principal) = tree.document_principal(inner) else {
        return true;
    };
    let site = principal.origin();

    if let Some(uri) = uri {
        if !uri.is_same_site(site) {
            return true;
        }
    }

    let mut current = inner;
    while let Some(parent) = tree.parent(current) {
        match tree.document_principal(parent) {
            Some(p) if p.origin().is_same_site(site) => current = parent,
            _ => return true,
        }
    }
    false
}

/// Whether a window is a third-party frame classified as tracking.
pub fn is_third_party_tracking_window(
    tree: &dyn ContextTree,
    classifier: &dyn TrackerClassifier,
    inner: InnerWindowId,
) -> bool {
    classifier.classify_window(inner).is_tracking && is_third_party_window(tree, inner, None)
}

/// Whether a load, or `uri` inside it, is third-party to its top-level site.
///
/// A known verdict from the host's utility is taken as is. Otherwise the
/// final URI and `uri` are compared to the top-level site; with no top-level
/// principal the load counts as third-party.
pub fn is_third_party_channel(channel: &ChannelInfo, uri: Option<&Origin>) -> bool {
    if let ThirdPartyVerdict::Known(third_party) = channel.third_party {
        return third_party;
    }

    let Some(top) = channel.resolve_top_level_principal() else {
        return true;
    };
    let site = top.origin();

    let load_is_foreign = channel
        .final_uri
        .as_ref()
        .map(|o| !o.is_same_site(site))
        .unwrap_or(false);
    let uri_is_foreign = uri.map(|o| !o.is_same_site(site)).unwrap_or(false);
    load_is_foreign || uri_is_foreign
}

/// Derive the top-level principal, tracking principal and tracking origin of
/// a third-party window.
///
/// `RejectTracker` uses the storage-area principal, which only exists for
/// singly-nested frames. Every other mode uses the anti-tracking principal of
/// the top document.
pub fn tracking_context(
    tree: &dyn ContextTree,
    inner: InnerWindowId,
    behavior: BehaviorMode,
) -> Option<TrackingContext> {
    let top_level_principal = if behavior == BehaviorMode::RejectTracker {
        tree.top_level_storage_area_principal(inner)
    } else {
        tree.top_level_anti_tracking_principal(inner)
    };
    let Some(top_level_principal) = top_level_principal else {
        tracing::debug!(window = %inner, "no top-level storage area principal at hand");
        return None;
    };

    let tracking_principal = tree.document_principal(inner)?;
    let tracking_origin = tracking_principal.origin().ascii_serialization();

    Some(TrackingContext {
        top_level_principal,
        tracking_principal,
        tracking_origin,
    })
}
