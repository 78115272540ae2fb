//! View and collaborator interfaces
//!
//! The engine never constructs, renders, or destroys views. It talks to
//! the surrounding application through the small traits here: a view
//! surface for callback dispatch, a provider that owns view instances, a
//! rendering sink that performs the visual swap, and a location indicator
//! mirroring the committed fragment.

use std::any::Any;
use std::fmt;

/// Identifier of a view, unique across the sitemap.
///
/// One view identifier backs at most one view node; the sitemap enforces
/// this at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ViewId(String);

impl ViewId {
    /// Create a view identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ViewId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ViewId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A navigable view instance.
///
/// Lifecycle callbacks are looked up by the view's concrete runtime type,
/// so implementations expose it through [`as_any`](Self::as_any) /
/// [`as_any_mut`](Self::as_any_mut). If the application wraps views (for
/// example a DI container handing out decorated instances), the
/// [`ViewProvider`] must return the unwrapped instance so the concrete
/// type is the one callbacks were registered for.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `View`",
    label = "this type cannot be navigated to",
    note = "implement `as_any` and `as_any_mut` by returning `self`; override `has_root` if the view builds its visual root lazily"
)]
pub trait View: Any + Send {
    /// The view as `&dyn Any`, for concrete-type inspection.
    fn as_any(&self) -> &dyn Any;

    /// The view as `&mut dyn Any`, for callback dispatch.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Whether the view's root visual artifact exists.
    ///
    /// Checked after the inbound callbacks and before the visual swap. A
    /// view without a root at that point is a programming error, not a
    /// recoverable navigation outcome.
    fn has_root(&self) -> bool {
        true
    }
}

/// Owns and hands out view instances.
///
/// Construction and caching policy is entirely the provider's business;
/// the engine only ever borrows.
pub trait ViewProvider: Send {
    /// Borrow the instance for a view identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ViewProviderError`] when no instance can be produced.
    fn get(&mut self, view: &ViewId) -> Result<&mut dyn View, ViewProviderError>;
}

/// A view provider could not produce an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewProviderError {
    /// The requested view identifier.
    pub view: ViewId,
    /// Provider-specific description of the failure.
    pub source: String,
}

impl fmt::Display for ViewProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no instance for view \"{}\": {}", self.view, self.source)
    }
}

impl std::error::Error for ViewProviderError {}

/// Performs the visual swap once a navigation commits.
///
/// Called exactly once per committed navigation. The engine consumes no
/// return value; rendering failures are the sink's to handle.
pub trait RenderingSink: Send {
    /// Show the given view.
    fn change_view(&mut self, view: &dyn View);
}

/// The externally observable address.
///
/// The engine treats it as a plain string mirror of the current state's
/// fragment. `fire_events = false` must suppress any change notification
/// the indicator would otherwise emit; the engine relies on this when
/// synchronizing after a commit to avoid re-triggering navigation.
pub trait LocationIndicator: Send {
    /// The currently shown location string.
    fn location(&self) -> String;

    /// Update the shown location.
    fn set_location(&mut self, fragment: &str, fire_events: bool);
}
