//! `AccessRule` - Authorization rules attached to sitemap nodes
//!
//! A closed set of rule variants, each a pure predicate over a [`Subject`]
//! capability query. Rules are stateless values; the unit variants act as
//! process-wide singletons because they carry no data and live inside the
//! shared sitemap.

use std::fmt;

/// Capability query for the current subject.
///
/// Implemented by the authentication/authorization provider outside this
/// crate. The engine only asks questions; verifying credentials is the
/// provider's business.
pub trait Subject: Send + Sync {
    /// The subject has an authenticated session.
    fn is_authenticated(&self) -> bool;

    /// The subject is recognized from a previous session (for example via
    /// a remember-me token) without a full authentication.
    fn is_remembered(&self) -> bool;

    /// The subject holds the named role.
    fn has_role(&self, role: &str) -> bool;

    /// The subject holds the named permission.
    fn is_permitted(&self, permission: &str) -> bool;
}

/// How a composite rule combines its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Every item is required.
    All,
    /// At least one item is required.
    Any,
}

/// Why an access check failed.
///
/// For an [`Combinator::Any`] composite, every item is tried before the
/// denial is raised, and the denial references the first item, so callers
/// always see a concrete missing capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    /// The rule requires an authenticated subject.
    NotAuthenticated,
    /// The rule requires a guest: neither authenticated nor remembered.
    NotGuest,
    /// The rule requires a known user: authenticated or remembered.
    NotUser,
    /// A required permission is missing.
    MissingPermission {
        /// The permission the subject does not hold.
        permission: String,
    },
    /// A required role is missing.
    MissingRole {
        /// The role the subject does not hold.
        role: String,
    },
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "subject is not authenticated"),
            Self::NotGuest => write!(f, "subject is not a guest"),
            Self::NotUser => write!(f, "subject is neither authenticated nor remembered"),
            Self::MissingPermission { permission } => {
                write!(f, "subject lacks permission \"{permission}\"")
            }
            Self::MissingRole { role } => write!(f, "subject lacks role \"{role}\""),
        }
    }
}

impl std::error::Error for AccessDenied {}

/// Authorization rule attached to a sitemap node.
///
/// Each variant is a pure function from a [`Subject`] to pass-or-deny.
/// Rules never consult anything but the subject, so they can be evaluated
/// at any point of a navigation without side effects.
///
/// # Example
///
/// ```
/// use waymark::{AccessRule, Combinator, Subject};
///
/// struct Nobody;
/// impl Subject for Nobody {
///     fn is_authenticated(&self) -> bool { false }
///     fn is_remembered(&self) -> bool { false }
///     fn has_role(&self, _: &str) -> bool { false }
///     fn is_permitted(&self, _: &str) -> bool { false }
/// }
///
/// assert!(AccessRule::Public.check(&Nobody).is_ok());
/// assert!(AccessRule::Guest.check(&Nobody).is_ok());
/// assert!(AccessRule::Authenticated.check(&Nobody).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// Always passes.
    Public,
    /// The subject must be authenticated.
    Authenticated,
    /// The subject must be neither authenticated nor remembered.
    Guest,
    /// The subject must be authenticated or remembered.
    User,
    /// The subject must hold one or all of the named permissions.
    Permissions {
        /// The permission names to check.
        items: Vec<String>,
        /// How the items combine.
        combinator: Combinator,
    },
    /// The subject must hold one or all of the named roles.
    Roles {
        /// The role names to check.
        items: Vec<String>,
        /// How the items combine.
        combinator: Combinator,
    },
}

impl AccessRule {
    /// All of the given permissions are required.
    pub fn permissions_all<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Permissions {
            items: items.into_iter().map(Into::into).collect(),
            combinator: Combinator::All,
        }
    }

    /// Any one of the given permissions suffices.
    pub fn permissions_any<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Permissions {
            items: items.into_iter().map(Into::into).collect(),
            combinator: Combinator::Any,
        }
    }

    /// All of the given roles are required.
    pub fn roles_all<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles {
            items: items.into_iter().map(Into::into).collect(),
            combinator: Combinator::All,
        }
    }

    /// Any one of the given roles suffices.
    pub fn roles_any<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles {
            items: items.into_iter().map(Into::into).collect(),
            combinator: Combinator::Any,
        }
    }

    /// Evaluate this rule against a subject.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] naming the missing capability. An `Any`
    /// composite tries every item and, when none passes, denies with the
    /// first item.
    pub fn check(&self, subject: &dyn Subject) -> Result<(), AccessDenied> {
        match self {
            Self::Public => Ok(()),
            Self::Authenticated => {
                if subject.is_authenticated() {
                    Ok(())
                } else {
                    Err(AccessDenied::NotAuthenticated)
                }
            }
            Self::Guest => {
                if !subject.is_authenticated() && !subject.is_remembered() {
                    Ok(())
                } else {
                    Err(AccessDenied::NotGuest)
                }
            }
            Self::User => {
                if subject.is_authenticated() || subject.is_remembered() {
                    Ok(())
                } else {
                    Err(AccessDenied::NotUser)
                }
            }
            Self::Permissions { items, combinator } => check_items(
                items,
                *combinator,
                |item| subject.is_permitted(item),
                |item| AccessDenied::MissingPermission {
                    permission: item.to_string(),
                },
            ),
            Self::Roles { items, combinator } => check_items(
                items,
                *combinator,
                |item| subject.has_role(item),
                |item| AccessDenied::MissingRole {
                    role: item.to_string(),
                },
            ),
        }
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Guest => write!(f, "guest"),
            Self::User => write!(f, "user"),
            Self::Permissions { items, combinator } => {
                write!(f, "permissions({combinator:?}: {})", items.join(", "))
            }
            Self::Roles { items, combinator } => {
                write!(f, "roles({combinator:?}: {})", items.join(", "))
            }
        }
    }
}

/// Shared composite evaluation.
///
/// An empty item list passes under either combinator; rule authors are
/// expected not to register empty composites.
fn check_items<F, D>(
    items: &[String],
    combinator: Combinator,
    holds: F,
    deny: D,
) -> Result<(), AccessDenied>
where
    F: Fn(&str) -> bool,
    D: Fn(&str) -> AccessDenied,
{
    match combinator {
        Combinator::All => match items.iter().find(|item| !holds(item)) {
            Some(missing) => Err(deny(missing)),
            None => Ok(()),
        },
        Combinator::Any => {
            // Try every item before denying so the denial can reference a
            // concrete capability (the first one).
            if items.is_empty() || items.iter().any(|item| holds(item)) {
                Ok(())
            } else {
                Err(deny(&items[0]))
            }
        }
    }
}
