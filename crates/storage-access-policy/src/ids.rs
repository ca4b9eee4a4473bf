//! Opaque handles into the host's frame tree.
//!
//! The engine never owns windows or browsing contexts. It refers to them by
//! id and asks a [`ContextTree`](crate::ContextTree) to resolve relations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A browsing context (a frame slot that may host successive documents).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrowsingContextId(pub u64);

/// The outer window of a browsing context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OuterWindowId(pub u64);

/// An inner window: one document's global inside an outer window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InnerWindowId(pub u64);

macro_rules! impl_id_fmt {
    ($ty:ident, $prefix:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

impl_id_fmt!(BrowsingContextId, "BrowsingContext");
impl_id_fmt!(OuterWindowId, "OuterWindow");
impl_id_fmt!(InnerWindowId, "InnerWindow");
