//! Config types for definition-driven sitemap construction.
//!
//! These types mirror the runtime sitemap operations but are
//! serde-deserializable, so a whole sitemap can be declared in JSON or
//! YAML and loaded through [`ConfigLoader`].
//!
//! # Relationship to runtime operations
//!
//! | Config type | Runtime operation |
//! |-------------|-------------------|
//! | [`RouteConfig`] | [`Sitemap::add_view`](crate::Sitemap::add_view) |
//! | [`RedirectConfig`] | [`Sitemap::add_redirect`](crate::Sitemap::add_redirect) |
//! | [`StandardPagesConfig`] | [`Sitemap::set_standard_page`](crate::Sitemap::set_standard_page) |
//! | [`AccessConfig`] | [`AccessRule`](crate::AccessRule) |
//!
//! Routes load first, then redirects (whose targets are named view ids),
//! then standard pages, so a definition never needs forward references.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    AccessRule, Combinator, Sitemap, SitemapError, SitemapLoader, StandardPage, ViewId,
};

/// A complete sitemap definition.
///
/// # Example
///
/// ```
/// use waymark::{ConfigLoader, Sitemap, SitemapConfig};
///
/// let json = r##"{
///     "routes": [
///         { "pattern": "home", "view": "home" },
///         { "pattern": "admin", "view": "admin",
///           "access": { "type": "roles", "items": ["admin"] } }
///     ],
///     "redirects": [
///         { "pattern": "start", "to": "home" }
///     ],
///     "standard_pages": { "public_home": "home" }
/// }"##;
///
/// let loader = ConfigLoader::from_json(json).unwrap();
/// let sitemap = Sitemap::build_with(&[&loader]).unwrap();
/// assert_eq!(sitemap.len(), 3);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SitemapConfig {
    /// View-backed routes, in registration (and resolution) order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Redirects, registered after every route.
    #[serde(default)]
    pub redirects: Vec<RedirectConfig>,

    /// Standard page bindings, by view id.
    #[serde(default)]
    pub standard_pages: StandardPagesConfig,
}

/// One view-backed route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// The raw route pattern.
    pub pattern: String,

    /// The view identifier the pattern leads to.
    pub view: String,

    /// The access rule; public when omitted.
    #[serde(default)]
    pub access: AccessConfig,
}

/// One redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectConfig {
    /// The raw route pattern of the redirect itself.
    pub pattern: String,

    /// The view id of the target node. Must name a route in the same
    /// definition or one registered by an earlier loader.
    pub to: String,
}

/// Standard page bindings. Each field names a registered view id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandardPagesConfig {
    /// Landing page for unauthenticated visitors.
    #[serde(default)]
    pub public_home: Option<String>,

    /// The authentication entry point.
    #[serde(default)]
    pub login: Option<String>,

    /// The sign-out page.
    #[serde(default)]
    pub logout: Option<String>,

    /// Landing page after authentication.
    #[serde(default)]
    pub private_home: Option<String>,
}

impl StandardPagesConfig {
    fn entries(&self) -> [(StandardPage, &Option<String>); 4] {
        [
            (StandardPage::PublicHome, &self.public_home),
            (StandardPage::Login, &self.login),
            (StandardPage::Logout, &self.logout),
            (StandardPage::PrivateHome, &self.private_home),
        ]
    }
}

/// How a composite access rule combines its items in a definition.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CombinatorConfig {
    /// Every item is required.
    #[default]
    All,
    /// At least one item is required.
    Any,
}

impl From<CombinatorConfig> for Combinator {
    fn from(c: CombinatorConfig) -> Self {
        match c {
            CombinatorConfig::All => Combinator::All,
            CombinatorConfig::Any => Combinator::Any,
        }
    }
}

/// Access rule in a definition.
///
/// Uses `#[serde(tag = "type")]` for discriminated union deserialization:
///
/// ```json
/// { "type": "public" }
/// { "type": "authenticated" }
/// { "type": "permissions", "items": ["doc:read"], "combinator": "any" }
/// { "type": "roles", "items": ["admin"] }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessConfig {
    /// Always passes.
    #[default]
    Public,
    /// Requires an authenticated subject.
    Authenticated,
    /// Requires a guest subject.
    Guest,
    /// Requires an authenticated or remembered subject.
    User,
    /// Requires one or all of the named permissions.
    Permissions {
        /// The permission names.
        items: Vec<String>,
        /// How the items combine; all when omitted.
        #[serde(default)]
        combinator: CombinatorConfig,
    },
    /// Requires one or all of the named roles.
    Roles {
        /// The role names.
        items: Vec<String>,
        /// How the items combine; all when omitted.
        #[serde(default)]
        combinator: CombinatorConfig,
    },
}

impl From<AccessConfig> for AccessRule {
    fn from(c: AccessConfig) -> Self {
        match c {
            AccessConfig::Public => AccessRule::Public,
            AccessConfig::Authenticated => AccessRule::Authenticated,
            AccessConfig::Guest => AccessRule::Guest,
            AccessConfig::User => AccessRule::User,
            AccessConfig::Permissions { items, combinator } => AccessRule::Permissions {
                items,
                combinator: combinator.into(),
            },
            AccessConfig::Roles { items, combinator } => AccessRule::Roles {
                items,
                combinator: combinator.into(),
            },
        }
    }
}

/// Loads a [`SitemapConfig`] into a sitemap.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: SitemapConfig,
}

impl ConfigLoader {
    /// Wrap an already deserialized definition.
    #[must_use]
    pub fn new(config: SitemapConfig) -> Self {
        Self { config }
    }

    /// Parse a JSON definition.
    ///
    /// # Errors
    ///
    /// [`SitemapError::InvalidConfig`] when the JSON does not deserialize.
    pub fn from_json(json: &str) -> Result<Self, SitemapError> {
        let config = serde_json::from_str(json).map_err(|e| SitemapError::InvalidConfig {
            source: e.to_string(),
        })?;
        Ok(Self::new(config))
    }
}

impl SitemapLoader for ConfigLoader {
    fn load(&self, sitemap: &mut Sitemap) -> Result<(), SitemapError> {
        for route in &self.config.routes {
            sitemap.add_view(
                &route.pattern,
                ViewId::from(route.view.clone()),
                route.access.clone().into(),
            )?;
        }
        for redirect in &self.config.redirects {
            let target = sitemap
                .node_for_view(&ViewId::from(redirect.to.clone()))
                .map(Arc::clone)
                .ok_or_else(|| SitemapError::UnknownRedirectTarget {
                    to: redirect.to.clone(),
                })?;
            sitemap.add_redirect(&redirect.pattern, &target)?;
        }
        for (page, view) in self.config.standard_pages.entries() {
            if let Some(view) = view {
                let node = sitemap
                    .node_for_view(&ViewId::from(view.clone()))
                    .map(Arc::clone)
                    .ok_or_else(|| SitemapError::UnknownRedirectTarget { to: view.clone() })?;
                sitemap.set_standard_page(page, &node)?;
            }
        }
        Ok(())
    }
}
