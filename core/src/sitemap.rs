//! `Sitemap` - Redirect-aware route tree
//!
//! Owns every route node, enforces the uniqueness invariants, and resolves
//! requested locations (by fragment, standard page, or view identity) to
//! [`NavigationState`]s, following redirects transparently.
//!
//! # Lifecycle
//!
//! A sitemap is populated once at application start-up by one or more
//! [`SitemapLoader`]s running single-threaded, then published behind an
//! `Arc` via [`Sitemap::build_with`]. Publishing through the immutable
//! reference is the memory-visibility fence: after it, `resolve` needs no
//! synchronization and the tree is freely shared across sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::{
    AccessRule, NavigationParams, NavigationState, PatternError, UriPattern, ViewId,
};

/// Well-known entry points, each mapped 1:1 to a registered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StandardPage {
    /// Landing page for unauthenticated visitors.
    PublicHome,
    /// The authentication entry point.
    Login,
    /// The sign-out page.
    Logout,
    /// Landing page after authentication.
    PrivateHome,
}

impl StandardPage {
    /// All standard page keys.
    pub const ALL: [StandardPage; 4] = [
        StandardPage::PublicHome,
        StandardPage::Login,
        StandardPage::Logout,
        StandardPage::PrivateHome,
    ];

    /// The canonical key string, as used in config files.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::PublicHome => "public_home",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PrivateHome => "private_home",
        }
    }
}

impl fmt::Display for StandardPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Errors from sitemap construction.
///
/// All of these are configuration errors surfaced while loaders run, and
/// should abort start-up. A failed operation leaves the tree exactly as
/// it was: duplicate checks happen before any structure is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapError {
    /// A route pattern failed to compile.
    Pattern(PatternError),
    /// Two nodes would share an identical raw pattern string.
    DuplicatePattern {
        /// The pattern registered twice.
        pattern: String,
    },
    /// A view identifier is already bound to another node.
    DuplicateView {
        /// The identifier bound twice.
        view: ViewId,
        /// The pattern of the node it is already bound to.
        existing: String,
    },
    /// A standard page key was set twice.
    DuplicateStandardPage {
        /// The key set twice.
        page: StandardPage,
    },
    /// A redirect definition names a view that is not registered.
    UnknownRedirectTarget {
        /// The unresolvable target view identifier.
        to: String,
    },
    /// A sitemap definition could not be read or was semantically invalid.
    InvalidConfig {
        /// The underlying error message.
        source: String,
    },
}

impl fmt::Display for SitemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(e) => write!(f, "{e}"),
            Self::DuplicatePattern { pattern } => {
                write!(f, "pattern \"{pattern}\" is already registered")
            }
            Self::DuplicateView { view, existing } => write!(
                f,
                "view \"{view}\" is already bound to pattern \"{existing}\""
            ),
            Self::DuplicateStandardPage { page } => {
                write!(f, "standard page \"{page}\" is already set")
            }
            Self::UnknownRedirectTarget { to } => {
                write!(f, "redirect target view \"{to}\" is not registered")
            }
            Self::InvalidConfig { source } => write!(f, "invalid sitemap definition: {source}"),
        }
    }
}

impl std::error::Error for SitemapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PatternError> for SitemapError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

/// A requested location could not be resolved.
///
/// Carries the attempted request and every registered pattern so the
/// failure is diagnosable from the error alone. Recoverable: callers
/// typically redirect to a not-found view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNotFoundError {
    /// What was asked for: a fragment, a standard page key, or a view id.
    pub requested: String,
    /// Raw patterns of every registered node, registration order.
    pub known_patterns: Vec<String>,
}

impl fmt::Display for PageNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no page found for \"{}\"", self.requested)?;
        if self.known_patterns.is_empty() {
            write!(f, "; the sitemap is empty")
        } else {
            write!(f, "; registered: {}", self.known_patterns.join(", "))
        }
    }
}

impl std::error::Error for PageNotFoundError {}

/// What a node routes to.
#[derive(Debug)]
enum NodeTarget {
    /// A view-backed node.
    View {
        view: ViewId,
        rule: AccessRule,
    },
    /// A redirect. Chains collapse at insertion time, so a stored
    /// redirect always points at a view-backed node.
    Redirect { to: Arc<SitemapNode> },
}

/// One entry in the sitemap: a compiled pattern plus its target.
///
/// View-backed nodes carry their own identifier and access rule. Redirect
/// nodes inherit both from their target, so `view_id` and `access_rule`
/// are total over both variants.
#[derive(Debug)]
pub struct SitemapNode {
    pattern: UriPattern,
    target: NodeTarget,
}

impl SitemapNode {
    /// The compiled pattern this node matches and builds fragments with.
    #[must_use]
    pub fn pattern(&self) -> &UriPattern {
        &self.pattern
    }

    /// Whether this node is a redirect.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.target, NodeTarget::Redirect { .. })
    }

    /// The view identifier this node leads to, through redirects.
    #[must_use]
    pub fn view_id(&self) -> &ViewId {
        match &self.target {
            NodeTarget::View { view, .. } => view,
            NodeTarget::Redirect { to } => to.view_id(),
        }
    }

    /// The access rule guarding this node, through redirects.
    #[must_use]
    pub fn access_rule(&self) -> &AccessRule {
        match &self.target {
            NodeTarget::View { rule, .. } => rule,
            NodeTarget::Redirect { to } => to.access_rule(),
        }
    }
}

/// The view-backed node a resolution of `node` yields.
fn destination(node: &Arc<SitemapNode>) -> Arc<SitemapNode> {
    match &node.target {
        NodeTarget::View { .. } => Arc::clone(node),
        NodeTarget::Redirect { to } => Arc::clone(to),
    }
}

/// Populates a sitemap at start-up.
///
/// Loaders are the only mutation surface; once [`Sitemap::build_with`]
/// returns, the tree is read-only.
pub trait SitemapLoader {
    /// Register this loader's routes.
    ///
    /// # Errors
    ///
    /// Any [`SitemapError`] aborts the build.
    fn load(&self, sitemap: &mut Sitemap) -> Result<(), SitemapError>;
}

/// The route tree.
///
/// Nodes are kept in registration order, which is also resolution order:
/// [`resolve_fragment`](Self::resolve_fragment) returns the first match.
///
/// # Example
///
/// ```
/// use waymark::{AccessRule, Sitemap};
///
/// let mut sitemap = Sitemap::new();
/// let users = sitemap
///     .add_view(r"user/{id:\d+}", "user-detail", AccessRule::Authenticated)
///     .unwrap();
/// sitemap.add_redirect(r"member/{id:\d+}", &users).unwrap();
///
/// let state = sitemap.resolve_fragment("member/7").unwrap();
/// assert_eq!(state.view_id().as_str(), "user-detail");
/// assert_eq!(state.params().as_string("id").as_deref(), Some("7"));
/// ```
#[derive(Debug, Default)]
pub struct Sitemap {
    nodes: Vec<Arc<SitemapNode>>,
    views: HashMap<ViewId, Arc<SitemapNode>>,
    standard: HashMap<StandardPage, Arc<SitemapNode>>,
}

impl Sitemap {
    /// Create an empty sitemap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the given loaders over a fresh sitemap and publish it.
    ///
    /// The returned `Arc` is the read-only handle shared across sessions.
    ///
    /// # Errors
    ///
    /// The first loader failure aborts the build.
    pub fn build_with(loaders: &[&dyn SitemapLoader]) -> Result<Arc<Self>, SitemapError> {
        let mut sitemap = Self::new();
        for loader in loaders {
            loader.load(&mut sitemap)?;
        }
        Ok(Arc::new(sitemap))
    }

    /// Number of registered nodes, redirects included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no nodes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<SitemapNode>> {
        self.nodes.iter()
    }

    /// The node a view identifier is bound to, if any.
    #[must_use]
    pub fn node_for_view(&self, view: &ViewId) -> Option<&Arc<SitemapNode>> {
        self.views.get(view)
    }

    /// Create and register a view-backed node.
    ///
    /// # Errors
    ///
    /// [`SitemapError::Pattern`] if the pattern does not compile,
    /// [`SitemapError::DuplicatePattern`] if the raw pattern is already
    /// registered, [`SitemapError::DuplicateView`] if the identifier is
    /// already bound. On error the tree is unchanged.
    pub fn add_view(
        &mut self,
        pattern: &str,
        view: impl Into<ViewId>,
        rule: AccessRule,
    ) -> Result<Arc<SitemapNode>, SitemapError> {
        let view = view.into();
        let pattern = UriPattern::compile(pattern)?;
        self.check_pattern_free(pattern.raw())?;
        if let Some(existing) = self.views.get(&view) {
            return Err(SitemapError::DuplicateView {
                view,
                existing: existing.pattern().raw().to_string(),
            });
        }

        let node = Arc::new(SitemapNode {
            pattern,
            target: NodeTarget::View {
                view: view.clone(),
                rule,
            },
        });
        self.nodes.push(Arc::clone(&node));
        self.views.insert(view, Arc::clone(&node));
        Ok(node)
    }

    /// Create and register a redirect node.
    ///
    /// The target may itself be a redirect; the chain collapses here, so
    /// no partially resolved redirect is ever observable.
    ///
    /// # Errors
    ///
    /// Same pattern checks as [`add_view`](Self::add_view). On error the
    /// tree is unchanged.
    pub fn add_redirect(
        &mut self,
        pattern: &str,
        target: &Arc<SitemapNode>,
    ) -> Result<Arc<SitemapNode>, SitemapError> {
        let pattern = UriPattern::compile(pattern)?;
        self.check_pattern_free(pattern.raw())?;

        let node = Arc::new(SitemapNode {
            pattern,
            target: NodeTarget::Redirect {
                to: destination(target),
            },
        });
        self.nodes.push(Arc::clone(&node));
        Ok(node)
    }

    /// Register a node as a standard page.
    ///
    /// # Errors
    ///
    /// [`SitemapError::DuplicateStandardPage`] if the key is already set.
    pub fn set_standard_page(
        &mut self,
        page: StandardPage,
        node: &Arc<SitemapNode>,
    ) -> Result<(), SitemapError> {
        if self.standard.contains_key(&page) {
            return Err(SitemapError::DuplicateStandardPage { page });
        }
        self.standard.insert(page, Arc::clone(node));
        Ok(())
    }

    /// The node registered for a standard page, if any.
    #[must_use]
    pub fn standard_page(&self, page: StandardPage) -> Option<&Arc<SitemapNode>> {
        self.standard.get(&page)
    }

    /// Resolve a fragment to a navigation state.
    ///
    /// Every node's matcher is tried in registration order, redirects
    /// included, and the first full match wins. More than one matching
    /// node is not an error: the tie is logged as an ambiguity and the
    /// first registration still wins, keeping resolution total and
    /// deterministic.
    ///
    /// # Errors
    ///
    /// [`PageNotFoundError`] when no node matches.
    pub fn resolve_fragment(&self, fragment: &str) -> Result<NavigationState, PageNotFoundError> {
        let mut winner: Option<(&Arc<SitemapNode>, NavigationParams)> = None;
        let mut shadowed: Vec<&str> = Vec::new();

        for node in &self.nodes {
            if let Some(params) = node.pattern().match_fragment(fragment) {
                if winner.is_none() {
                    winner = Some((node, params));
                } else {
                    shadowed.push(node.pattern().raw());
                }
            }
        }

        match winner {
            Some((node, params)) => {
                if !shadowed.is_empty() {
                    warn!(
                        "fragment \"{fragment}\" is ambiguous: \"{}\" wins by registration order, also matched by {}",
                        node.pattern().raw(),
                        shadowed
                            .iter()
                            .map(|p| format!("\"{p}\""))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                Ok(NavigationState::new(destination(node), params))
            }
            None => Err(self.not_found(fragment)),
        }
    }

    /// Resolve a standard page to a navigation state with empty
    /// parameters.
    ///
    /// # Errors
    ///
    /// [`PageNotFoundError`] when the key was never set.
    pub fn resolve_standard(&self, page: StandardPage) -> Result<NavigationState, PageNotFoundError> {
        match self.standard.get(&page) {
            Some(node) => Ok(NavigationState::new(
                destination(node),
                NavigationParams::new(),
            )),
            None => Err(self.not_found(page.key())),
        }
    }

    /// Resolve a view identifier to a navigation state with the given
    /// parameters.
    ///
    /// # Errors
    ///
    /// [`PageNotFoundError`] when the identifier is not bound.
    pub fn resolve_view(
        &self,
        view: &ViewId,
        params: NavigationParams,
    ) -> Result<NavigationState, PageNotFoundError> {
        match self.views.get(view) {
            Some(node) => Ok(NavigationState::new(destination(node), params)),
            None => Err(self.not_found(view.as_str())),
        }
    }

    fn check_pattern_free(&self, raw: &str) -> Result<(), SitemapError> {
        if self.nodes.iter().any(|n| n.pattern().raw() == raw) {
            return Err(SitemapError::DuplicatePattern {
                pattern: raw.to_string(),
            });
        }
        Ok(())
    }

    fn not_found(&self, requested: &str) -> PageNotFoundError {
        PageNotFoundError {
            requested: requested.to_string(),
            known_patterns: self
                .nodes
                .iter()
                .map(|n| n.pattern().raw().to_string())
                .collect(),
        }
    }
}
