//! waymark-test: Test domain for conformance testing
//!
//! Provides controllable collaborator doubles for exercising the
//! navigation engine end to end: a mutable subject, a map-backed view
//! provider, a recording sink and location, and listeners that record
//! (and optionally cancel) each phase into a shared log.
//!
//! # Example
//!
//! ```
//! use waymark_test::prelude::*;
//!
//! let subject = TestSubject::anonymous();
//! assert!(!subject.is_authenticated());
//!
//! subject.log_in();
//! assert!(subject.is_authenticated());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use waymark::{
    LocationIndicator, NavigationEvent, NavigationListener, RenderingSink, Subject, View, ViewId,
    ViewProvider, ViewProviderError,
};

/// Shared, appendable log of observed events.
///
/// Clones share the same underlying buffer, so a harness can hand copies
/// to listeners, sinks, and views and assert the interleaving afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Snapshot of all entries in record order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct SubjectState {
    authenticated: bool,
    remembered: bool,
    roles: Vec<String>,
    permissions: Vec<String>,
}

/// A mutable test subject.
///
/// Clones share state, so a test can keep one handle to flip
/// authentication while the navigator holds another.
#[derive(Debug, Clone, Default)]
pub struct TestSubject {
    state: Arc<Mutex<SubjectState>>,
}

impl TestSubject {
    /// Neither authenticated nor remembered, no roles or permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated subject.
    #[must_use]
    pub fn authenticated() -> Self {
        let subject = Self::default();
        subject.log_in();
        subject
    }

    /// Mark the subject authenticated.
    pub fn log_in(&self) {
        self.lock().authenticated = true;
    }

    /// Clear authentication and remembered status.
    pub fn log_out(&self) {
        let mut state = self.lock();
        state.authenticated = false;
        state.remembered = false;
    }

    /// Mark the subject remembered (without authentication).
    pub fn remember(&self) {
        self.lock().remembered = true;
    }

    /// Grant a role.
    pub fn grant_role(&self, role: impl Into<String>) {
        self.lock().roles.push(role.into());
    }

    /// Grant a permission.
    pub fn grant_permission(&self, permission: impl Into<String>) {
        self.lock().permissions.push(permission.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SubjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Subject for TestSubject {
    fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    fn is_remembered(&self) -> bool {
        self.lock().remembered
    }

    fn has_role(&self, role: &str) -> bool {
        self.lock().roles.iter().any(|r| r == role)
    }

    fn is_permitted(&self, permission: &str) -> bool {
        self.lock().permissions.iter().any(|p| p == permission)
    }
}

/// A minimal view with a name and a root.
#[derive(Debug)]
pub struct PlainView {
    /// Shown in sink logs.
    pub name: &'static str,
}

impl PlainView {
    /// Create a named view.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl View for PlainView {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A view whose root visual artifact is missing.
#[derive(Debug, Default)]
pub struct RootlessView;

impl View for RootlessView {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn has_root(&self) -> bool {
        false
    }
}

/// Map-backed view provider.
#[derive(Default)]
pub struct StaticViewProvider {
    views: HashMap<ViewId, Box<dyn View>>,
}

impl StaticViewProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance (builder pattern).
    #[must_use]
    pub fn with(mut self, view: impl Into<ViewId>, instance: Box<dyn View>) -> Self {
        self.views.insert(view.into(), instance);
        self
    }

    /// Register an instance.
    pub fn insert(&mut self, view: impl Into<ViewId>, instance: Box<dyn View>) {
        self.views.insert(view.into(), instance);
    }
}

impl ViewProvider for StaticViewProvider {
    fn get(&mut self, view: &ViewId) -> Result<&mut dyn View, ViewProviderError> {
        match self.views.get_mut(view) {
            Some(instance) => Ok(instance.as_mut()),
            None => Err(ViewProviderError {
                view: view.clone(),
                source: "not registered with StaticViewProvider".into(),
            }),
        }
    }
}

/// Rendering sink that records each swap.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    log: EventLog,
}

impl RecordingSink {
    /// Record swaps into the given log.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl RenderingSink for RecordingSink {
    fn change_view(&mut self, view: &dyn View) {
        match view.as_any().downcast_ref::<PlainView>() {
            Some(plain) => self.log.record(format!("sink:change-view:{}", plain.name)),
            None => self.log.record("sink:change-view"),
        }
    }
}

#[derive(Debug, Default)]
struct LocationState {
    current: String,
    last_fire_events: Option<bool>,
}

/// Location indicator double.
///
/// Clones share state, so a test can keep one handle for assertions
/// while the navigator owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeLocation {
    state: Arc<Mutex<LocationState>>,
}

impl FakeLocation {
    /// Create a location showing the empty string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently shown location.
    #[must_use]
    pub fn current(&self) -> String {
        self.lock().current.clone()
    }

    /// The `fire_events` flag of the most recent update, if any.
    #[must_use]
    pub fn last_fire_events(&self) -> Option<bool> {
        self.lock().last_fire_events
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocationIndicator for FakeLocation {
    fn location(&self) -> String {
        self.current()
    }

    fn set_location(&mut self, fragment: &str, fire_events: bool) {
        let mut state = self.lock();
        state.current = fragment.to_string();
        state.last_fire_events = Some(fire_events);
    }
}

/// Where a [`RecordingListener`] cancels, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPoint {
    /// Cancel during `before_security_check`.
    BeforeSecurityCheck,
    /// Cancel during `before_view_change`.
    BeforeViewChange,
}

/// Listener that records every phase and optionally cancels one.
#[derive(Debug)]
pub struct RecordingListener {
    name: &'static str,
    log: EventLog,
    cancel_at: Option<CancelPoint>,
}

impl RecordingListener {
    /// A listener that only records.
    #[must_use]
    pub fn new(name: &'static str, log: EventLog) -> Self {
        Self {
            name,
            log,
            cancel_at: None,
        }
    }

    /// A listener that records and cancels at the given point.
    #[must_use]
    pub fn cancelling(name: &'static str, log: EventLog, cancel_at: CancelPoint) -> Self {
        Self {
            name,
            log,
            cancel_at: Some(cancel_at),
        }
    }
}

impl NavigationListener for RecordingListener {
    fn before_security_check(&mut self, event: &mut NavigationEvent) {
        self.log
            .record(format!("{}:before-security-check", self.name));
        if self.cancel_at == Some(CancelPoint::BeforeSecurityCheck) {
            event.cancel();
        }
    }

    fn before_view_change(&mut self, event: &mut NavigationEvent) {
        self.log.record(format!("{}:before-view-change", self.name));
        if self.cancel_at == Some(CancelPoint::BeforeViewChange) {
            event.cancel();
        }
    }

    fn after_view_change(&mut self, event: &NavigationEvent) {
        self.log.record(format!(
            "{}:after-view-change:{}",
            self.name,
            event.target().fragment()
        ));
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        CancelPoint, EventLog, FakeLocation, PlainView, RecordingListener, RecordingSink,
        RootlessView, StaticViewProvider, TestSubject,
    };
    pub use waymark::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_handles_share_state() {
        let subject = TestSubject::anonymous();
        let handle = subject.clone();
        handle.log_in();
        assert!(subject.is_authenticated());
        handle.log_out();
        assert!(!subject.is_authenticated());
    }

    #[test]
    fn event_log_clones_share_entries() {
        let log = EventLog::new();
        let other = log.clone();
        other.record("one");
        log.record("two");
        assert_eq!(log.entries(), ["one", "two"]);
    }

    #[test]
    fn provider_reports_unknown_views() {
        let mut provider = StaticViewProvider::new().with("home", Box::new(PlainView::new("home")));
        assert!(provider.get(&ViewId::from("home")).is_ok());
        let err = provider.get(&ViewId::from("ghost")).err().unwrap();
        assert_eq!(err.view, ViewId::from("ghost"));
    }

    #[test]
    fn fake_location_records_fire_events() {
        let location = FakeLocation::new();
        let mut handle = location.clone();
        handle.set_location("home", false);
        assert_eq!(location.current(), "home");
        assert_eq!(location.last_fire_events(), Some(false));
    }
}
