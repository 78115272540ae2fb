//! `NavigationState` - A resolved location
//!
//! The immutable pairing of a resolved sitemap node and a parameter store
//! snapshot. States are built only by the sitemap, are cheap to clone
//! (two `Arc`s), and are safely shared across threads by reference.

use std::fmt;
use std::sync::Arc;

use crate::{AccessRule, NavigationParams, SitemapNode, ViewId};

/// An immutable (node, parameters) pair representing a resolved location.
///
/// The fragment representation is derived, never stored:
/// [`fragment`](Self::fragment) rebuilds it from the node's pattern and
/// the current parameter values, so it can never drift out of sync.
///
/// For a location resolved through a redirect, the node held here is the
/// redirect's target, so identity, view id, and access rule all reflect
/// what will actually be shown.
#[derive(Debug, Clone)]
pub struct NavigationState {
    node: Arc<SitemapNode>,
    params: Arc<NavigationParams>,
}

impl NavigationState {
    /// Built only by the sitemap during resolution.
    pub(crate) fn new(node: Arc<SitemapNode>, params: NavigationParams) -> Self {
        Self {
            node,
            params: Arc::new(params),
        }
    }

    /// The resolved sitemap node.
    #[must_use]
    pub fn node(&self) -> &Arc<SitemapNode> {
        &self.node
    }

    /// The parameter store snapshot.
    #[must_use]
    pub fn params(&self) -> &NavigationParams {
        &self.params
    }

    /// The identifier of the view this state shows.
    #[must_use]
    pub fn view_id(&self) -> &ViewId {
        self.node.view_id()
    }

    /// The access rule guarding this state.
    #[must_use]
    pub fn access_rule(&self) -> &AccessRule {
        self.node.access_rule()
    }

    /// The fragment for this state, derived from the node's pattern and
    /// the current parameter values.
    #[must_use]
    pub fn fragment(&self) -> String {
        self.node.pattern().build_fragment(&self.params)
    }
}

impl PartialEq for NavigationState {
    /// Two states are equal when they reference the same node and derive
    /// the same fragment. Used by the state machine to turn a navigation
    /// to the already-current location into a no-op.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) && self.fragment() == other.fragment()
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.fragment(), self.view_id())
    }
}
