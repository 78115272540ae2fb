//! `Navigator` - The navigation state machine
//!
//! One long-lived `Navigator` drives all navigation for a UI session. A
//! call to [`navigate_to`](Navigator::navigate_to) resolves the requested
//! target, runs the phased listener / authorization / callback pipeline,
//! commits the new state, and synchronizes the externally observable
//! location, in a fixed order that callers can rely on.
//!
//! # Ordering and cancellation
//!
//! The guarantees are ordering and cancellability, not named checkpoint
//! states. Listeners and callbacks run strictly in registration order;
//! any cancellable step that cancels aborts the remaining pipeline as a
//! silent, successful no-op. Authorization is the one failure that
//! raises instead, because callers branch into an authentication flow on
//! it and retry.
//!
//! # Threading
//!
//! A navigator is single-threaded per session: one navigation runs to
//! completion before the next may start, enforced by the owning session's
//! execution model rather than a lock here. Nothing in the pipeline
//! blocks on I/O.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::{
    AccessDenied, CallbackError, CallbackPhase, CallbackRegistry, ConversionError,
    LocationIndicator, NavigationParams, NavigationState, PageNotFoundError, RenderingSink,
    Sitemap, StandardPage, Subject, ViewId, ViewProvider, ViewProviderError,
};

/// A requested inbound target exists but its parameters cannot be bound.
///
/// Recoverable: callers typically redirect to a not-found view instead of
/// surfacing the conversion detail to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRouteError {
    /// Fragment of the target whose parameters failed to bind.
    pub fragment: String,
    /// The underlying conversion failure.
    pub source: ConversionError,
}

impl fmt::Display for InvalidRouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route \"{}\" is invalid: {}", self.fragment, self.source)
    }
}

impl std::error::Error for InvalidRouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors from a navigation request.
///
/// Every recoverable variant is raised before the commit point, so a
/// failed navigation leaves the committed current/previous pair exactly
/// as it was before the call. Developer-error variants surfacing in the
/// post-commit informational phases propagate too, with the new state
/// already current and consistent.
#[derive(Debug)]
pub enum NavigationError {
    /// The requested location does not resolve to any node.
    PageNotFound(PageNotFoundError),
    /// The target resolved but its parameters cannot be bound.
    InvalidRoute(InvalidRouteError),
    /// The target's access rule denied the current subject.
    ///
    /// Carries the resolved target state so the caller can run an
    /// authentication flow and retry the same navigation afterwards.
    Unauthorized {
        /// The state that was denied.
        state: NavigationState,
        /// The underlying rule failure.
        source: AccessDenied,
    },
    /// The view provider could not produce an instance.
    View(ViewProviderError),
    /// Callback dispatch failed outside the inbound-conversion path.
    Callback(CallbackError),
    /// The target view has no root visual artifact after its inbound
    /// callback ran. A programming error in the view, not a normal
    /// control-flow outcome.
    MissingRoot {
        /// The offending view.
        view: ViewId,
    },
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageNotFound(e) => write!(f, "{e}"),
            Self::InvalidRoute(e) => write!(f, "{e}"),
            Self::Unauthorized { state, source } => {
                write!(f, "navigation to \"{}\" denied: {source}", state.fragment())
            }
            Self::View(e) => write!(f, "{e}"),
            Self::Callback(e) => write!(f, "{e}"),
            Self::MissingRoot { view } => {
                write!(f, "view \"{view}\" has no root visual artifact")
            }
        }
    }
}

impl std::error::Error for NavigationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PageNotFound(e) => Some(e),
            Self::InvalidRoute(e) => Some(e),
            Self::Unauthorized { source, .. } => Some(source),
            Self::View(e) => Some(e),
            Self::Callback(e) => Some(e),
            Self::MissingRoot { .. } => None,
        }
    }
}

impl From<PageNotFoundError> for NavigationError {
    fn from(e: PageNotFoundError) -> Self {
        Self::PageNotFound(e)
    }
}

/// How a successful `navigate_to` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The new state was committed and is now current.
    Committed,
    /// The target equals the current state; nothing happened. This is
    /// what breaks feedback loops from components that react to a
    /// location change by navigating again.
    AlreadyCurrent,
    /// A listener or view cancelled the navigation. A successful no-op,
    /// not an error: a confirmation dialog must be able to block a
    /// navigation without raising.
    Cancelled,
}

/// The change event passed through a navigation's phases.
///
/// Wraps the previous and target states. During cancellable phases,
/// [`cancel`](Self::cancel) aborts the navigation; during informational
/// phases cancellation requests are ignored.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    previous: Option<NavigationState>,
    target: NavigationState,
    cancellable: bool,
    cancelled: bool,
}

impl NavigationEvent {
    pub(crate) fn new(
        previous: Option<NavigationState>,
        target: NavigationState,
        cancellable: bool,
    ) -> Self {
        Self {
            previous,
            target,
            cancellable,
            cancelled: false,
        }
    }

    /// The state being navigated away from, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&NavigationState> {
        self.previous.as_ref()
    }

    /// The state being navigated to.
    #[must_use]
    pub fn target(&self) -> &NavigationState {
        &self.target
    }

    /// Whether this phase of the navigation can still be cancelled.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Request cancellation. Ignored during non-cancellable phases.
    pub fn cancel(&mut self) {
        if self.cancellable {
            self.cancelled = true;
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Observer of navigation phases.
///
/// All methods default to doing nothing, so implementations override
/// only the phases they care about. The two `before_*` phases receive a
/// cancellable event; `after_view_change` is informational.
pub trait NavigationListener: Send {
    /// Before the target's access rule is evaluated.
    fn before_security_check(&mut self, _event: &mut NavigationEvent) {}

    /// After the access check passed, before any view is involved.
    fn before_view_change(&mut self, _event: &mut NavigationEvent) {}

    /// After the navigation committed and the view swap happened.
    fn after_view_change(&mut self, _event: &NavigationEvent) {}
}

/// Handle to a registered listener, for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// What to navigate to.
#[derive(Debug)]
pub enum NavigationTarget {
    /// A fragment string, matched against every node's pattern.
    Fragment(String),
    /// A well-known entry point.
    Standard(StandardPage),
    /// A view identifier with explicit parameters.
    View {
        /// The target view.
        view: ViewId,
        /// Parameters for the target's pattern.
        params: NavigationParams,
    },
    /// A state resolved earlier, navigated to as-is.
    State(NavigationState),
}

impl NavigationTarget {
    /// Target a view with parameters.
    pub fn view(view: impl Into<ViewId>, params: NavigationParams) -> Self {
        Self::View {
            view: view.into(),
            params,
        }
    }
}

impl From<&str> for NavigationTarget {
    fn from(fragment: &str) -> Self {
        Self::Fragment(fragment.to_string())
    }
}

impl From<String> for NavigationTarget {
    fn from(fragment: String) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<StandardPage> for NavigationTarget {
    fn from(page: StandardPage) -> Self {
        Self::Standard(page)
    }
}

impl From<ViewId> for NavigationTarget {
    fn from(view: ViewId) -> Self {
        Self::View {
            view,
            params: NavigationParams::new(),
        }
    }
}

impl From<NavigationState> for NavigationTarget {
    fn from(state: NavigationState) -> Self {
        Self::State(state)
    }
}

/// The navigation state machine for one UI session.
///
/// Owns the listener lists and the committed current/previous state
/// pair; everything else is borrowed from the shared sitemap, the shared
/// callback registry, and the session's collaborators.
pub struct Navigator {
    sitemap: Arc<Sitemap>,
    callbacks: Arc<CallbackRegistry>,
    subject: Arc<dyn Subject>,
    views: Box<dyn ViewProvider>,
    sink: Box<dyn RenderingSink>,
    location: Box<dyn LocationIndicator>,
    listeners: Vec<(ListenerHandle, Box<dyn NavigationListener>)>,
    next_handle: u64,
    current: Option<NavigationState>,
    previous: Option<NavigationState>,
}

impl Navigator {
    /// Create a navigator over the shared sitemap and callback registry
    /// plus this session's collaborators.
    pub fn new(
        sitemap: Arc<Sitemap>,
        callbacks: Arc<CallbackRegistry>,
        subject: Arc<dyn Subject>,
        views: Box<dyn ViewProvider>,
        sink: Box<dyn RenderingSink>,
        location: Box<dyn LocationIndicator>,
    ) -> Self {
        Self {
            sitemap,
            callbacks,
            subject,
            views,
            sink,
            location,
            listeners: Vec::new(),
            next_handle: 0,
            current: None,
            previous: None,
        }
    }

    /// The committed current state, if any navigation committed yet.
    #[must_use]
    pub fn current(&self) -> Option<&NavigationState> {
        self.current.as_ref()
    }

    /// The state before the current one, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&NavigationState> {
        self.previous.as_ref()
    }

    /// The shared sitemap this navigator resolves against.
    #[must_use]
    pub fn sitemap(&self) -> &Arc<Sitemap> {
        &self.sitemap
    }

    /// Register a listener. Listeners run in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn NavigationListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((handle, listener));
        handle
    }

    /// Remove a listener. Returns `false` for an unknown handle.
    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    /// Run a full navigation to `target`.
    ///
    /// The phases run in a fixed order: resolve; no-op on the already
    /// current state; before-security-check listeners; access check;
    /// before-view-change listeners; the current view's outbound
    /// callback; the target view's inbound callback and root check; the
    /// commit; the visual swap; the target's after-inbound callback;
    /// after-view-change listeners; location synchronization with events
    /// suppressed.
    ///
    /// Cancellation by any listener or view returns
    /// [`NavigationOutcome::Cancelled`] with no further side effects.
    ///
    /// # Errors
    ///
    /// [`NavigationError::PageNotFound`] / [`NavigationError::InvalidRoute`]
    /// when the target cannot be resolved or bound,
    /// [`NavigationError::Unauthorized`] when the access rule denies the
    /// subject, and the developer-error variants for provider, callback,
    /// and root-artifact failures. Every error path leaves the committed
    /// state pair untouched.
    pub fn navigate_to(
        &mut self,
        target: impl Into<NavigationTarget>,
    ) -> Result<NavigationOutcome, NavigationError> {
        let state = self.resolve_target(target.into())?;

        if self.current.as_ref() == Some(&state) {
            debug!("already at \"{}\"; nothing to do", state.fragment());
            return Ok(NavigationOutcome::AlreadyCurrent);
        }

        debug!("navigating to \"{}\"", state.fragment());
        let mut event = NavigationEvent::new(self.current.clone(), state.clone(), true);

        // Listeners fire one at a time so that a cancellation by listener
        // i keeps listeners i+1..N from ever running.
        for (_, listener) in &mut self.listeners {
            listener.before_security_check(&mut event);
            if event.is_cancelled() {
                debug!("cancelled during before-security-check");
                return Ok(NavigationOutcome::Cancelled);
            }
        }

        state
            .access_rule()
            .check(self.subject.as_ref())
            .map_err(|source| NavigationError::Unauthorized {
                state: state.clone(),
                source,
            })?;

        for (_, listener) in &mut self.listeners {
            listener.before_view_change(&mut event);
            if event.is_cancelled() {
                debug!("cancelled during before-view-change");
                return Ok(NavigationOutcome::Cancelled);
            }
        }

        // The current view may veto leaving.
        if let Some(current) = &self.current {
            let view = self
                .views
                .get(current.view_id())
                .map_err(NavigationError::View)?;
            self.callbacks
                .dispatch(view, CallbackPhase::BeforeOutbound, &mut event)
                .map_err(NavigationError::Callback)?;
            if event.is_cancelled() {
                debug!("cancelled by outbound view \"{}\"", current.view_id());
                return Ok(NavigationOutcome::Cancelled);
            }
        }

        // The target view may veto being shown; a parameter that fails to
        // bind surfaces as an invalid route here, not a silent failure.
        {
            let view = self
                .views
                .get(state.view_id())
                .map_err(NavigationError::View)?;
            self.callbacks
                .dispatch(view, CallbackPhase::BeforeInbound, &mut event)
                .map_err(|e| match e {
                    CallbackError::Conversion(source) => {
                        NavigationError::InvalidRoute(InvalidRouteError {
                            fragment: state.fragment(),
                            source,
                        })
                    }
                    other => NavigationError::Callback(other),
                })?;
            if event.is_cancelled() {
                debug!("cancelled by inbound view \"{}\"", state.view_id());
                return Ok(NavigationOutcome::Cancelled);
            }
            if !view.has_root() {
                return Err(NavigationError::MissingRoot {
                    view: state.view_id().clone(),
                });
            }
        }

        // Commit. From here on the new state is externally observable and
        // the remaining phases are informational.
        self.previous = self.current.take();
        self.current = Some(state.clone());

        let mut after = NavigationEvent::new(self.previous.clone(), state.clone(), false);
        {
            let view = self
                .views
                .get(state.view_id())
                .map_err(NavigationError::View)?;
            self.sink.change_view(&*view);
            self.callbacks
                .dispatch(view, CallbackPhase::AfterInbound, &mut after)
                .map_err(NavigationError::Callback)?;
        }

        for (_, listener) in &mut self.listeners {
            listener.after_view_change(&after);
        }

        // Mirror the committed fragment without firing change events, so
        // location observers cannot re-enter navigation.
        self.location.set_location(&state.fragment(), false);

        Ok(NavigationOutcome::Committed)
    }

    fn resolve_target(&self, target: NavigationTarget) -> Result<NavigationState, NavigationError> {
        match target {
            NavigationTarget::Fragment(fragment) => {
                Ok(self.sitemap.resolve_fragment(&fragment)?)
            }
            NavigationTarget::Standard(page) => Ok(self.sitemap.resolve_standard(page)?),
            NavigationTarget::View { view, params } => {
                Ok(self.sitemap.resolve_view(&view, params)?)
            }
            NavigationTarget::State(state) => Ok(state),
        }
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("current", &self.current.as_ref().map(NavigationState::fragment))
            .field("previous", &self.previous.as_ref().map(NavigationState::fragment))
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
