//! waymark - Sitemap-based navigation engine
//!
//! A navigation engine for fragment-addressed UIs: declarative route
//! patterns compile into bidirectional matchers, routes form a
//! redirect-aware sitemap, and a per-session state machine resolves
//! requested locations to views, enforces access control, and notifies
//! interested parties in a strict, cancellable order before anything is
//! rendered.
//!
//! # Architecture
//!
//! - [`UriPattern`] - Compiled route pattern; parses fragments AND builds
//!   them back from parameter values
//! - [`NavigationParams`] - Ordered parameter store with lazily derived
//!   values
//! - [`AccessRule`] - Closed set of authorization predicates over a
//!   [`Subject`] capability query
//! - [`Sitemap`] - Owns all route nodes, enforces uniqueness, resolves
//!   fragments / standard pages / view ids to [`NavigationState`]s,
//!   following redirects transparently
//! - [`CallbackRegistry`] - Explicit per-view-type lifecycle handler
//!   tables, bound by name and converted by type at dispatch
//! - [`Navigator`] - The per-session state machine tying it all together
//!
//! # Key Design Invariants
//!
//! 1. **First-match-wins resolution**: nodes are tried in registration
//!    order; ties are logged, never errors, keeping resolution total.
//!
//! 2. **Derived fragments**: a [`NavigationState`] never stores its
//!    fragment; it is rebuilt from the node's pattern on demand, so it
//!    cannot drift from the parameter values.
//!
//! 3. **Cancellation is not an error**: any listener or view vetoing a
//!    navigation produces a silent, successful no-op. Authorization
//!    denial is the one deliberate exception, because callers branch
//!    into an authentication flow on it.
//!
//! # Example
//!
//! ```
//! use waymark::{AccessRule, Sitemap};
//!
//! let mut sitemap = Sitemap::new();
//! sitemap.add_view("home", "home", AccessRule::Public).unwrap();
//! sitemap
//!     .add_view(r"user/{id:\d+}", "user-detail", AccessRule::Authenticated)
//!     .unwrap();
//!
//! let state = sitemap.resolve_fragment("user/42").unwrap();
//! assert_eq!(state.view_id().as_str(), "user-detail");
//! assert_eq!(state.fragment(), "user/42");
//! ```
//!
//! # Feature Flags
//!
//! - `serde` - serde derives on [`ViewId`] and [`StandardPage`]
//! - `config` - sitemap definitions loadable from JSON (pulls in `serde`)

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod access;
mod callback;
mod navigator;
mod params;
mod pattern;
mod sitemap;
mod state;
mod view;

#[cfg(feature = "config")]
mod config;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

pub use access::{AccessDenied, AccessRule, Combinator, Subject};
pub use callback::{
    route_param, CallbackArgs, CallbackError, CallbackPhase, CallbackRegistry, CallbackTable,
    CallbackTableBuilder, ConversionError, ConversionReason, RouteParam,
};
pub use navigator::{
    InvalidRouteError, ListenerHandle, NavigationError, NavigationEvent, NavigationListener,
    NavigationOutcome, NavigationTarget, Navigator,
};
pub use params::{DeriveFn, NavigationParams, ParamValue};
pub use pattern::{PatternError, UriPattern, DEFAULT_CONSTRAINT};
pub use sitemap::{
    PageNotFoundError, Sitemap, SitemapError, SitemapLoader, SitemapNode, StandardPage,
};
pub use state::NavigationState;
pub use view::{LocationIndicator, RenderingSink, View, ViewId, ViewProvider, ViewProviderError};

#[cfg(feature = "config")]
pub use config::{
    AccessConfig, CombinatorConfig, ConfigLoader, RedirectConfig, RouteConfig, SitemapConfig,
    StandardPagesConfig,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum nesting depth for `[...]` optional groups in a route pattern.
///
/// One level is a deliberate scope limit: deeper nesting fails pattern
/// compilation instead of silently mis-matching.
pub const MAX_OPTIONAL_DEPTH: usize = 1;

/// Maximum length for a raw route pattern.
///
/// Patterns compile to regexes, and regex compilation cost grows faster
/// than literal matching; a sitemap has no business containing patterns
/// anywhere near this long.
pub const MAX_PATTERN_LENGTH: usize = 4096;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        route_param,
        AccessDenied,
        // Access control
        AccessRule,
        CallbackPhase,
        CallbackRegistry,
        // Callbacks
        CallbackTable,
        Combinator,
        ListenerHandle,
        LocationIndicator,
        NavigationError,
        NavigationEvent,
        NavigationListener,
        NavigationOutcome,
        // Parameters and states
        NavigationParams,
        NavigationState,
        NavigationTarget,
        // The state machine
        Navigator,
        // Errors
        PageNotFoundError,
        PatternError,
        RenderingSink,
        // The tree
        Sitemap,
        SitemapError,
        SitemapLoader,
        SitemapNode,
        StandardPage,
        Subject,
        // Patterns
        UriPattern,
        // Collaborators
        View,
        ViewId,
        ViewProvider,
    };

    #[cfg(feature = "config")]
    pub use super::{ConfigLoader, SitemapConfig};
}
