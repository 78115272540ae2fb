//! End-to-end conformance tests for the navigation pipeline.
//!
//! Each test drives a full `Navigator` wired to the test-domain
//! collaborators and asserts on the observable interleaving: listener
//! order, cancellation, authorization, commits, and location sync.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use waymark::prelude::*;
use waymark_test::prelude::*;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scenario views
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct HomeView;

impl View for HomeView {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct UserView;

impl View for UserView {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Declares a numeric route parameter for a route whose pattern accepts
/// any word characters, so conversion failures are reachable.
#[derive(Default)]
struct ProfileView;

impl View for ProfileView {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Vetoes being left while the shared flag is set.
#[derive(Default)]
struct DoorView;

impl View for DoorView {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════════════════

struct Harness {
    navigator: Navigator,
    subject: TestSubject,
    log: EventLog,
    location: FakeLocation,
    veto_leaving: Arc<AtomicBool>,
}

/// A sitemap with one route per access shape, a redirect, standard
/// pages, and callback tables that record into the shared log.
fn harness() -> Harness {
    init_logs();
    let log = EventLog::new();
    let subject = TestSubject::anonymous();
    let location = FakeLocation::new();
    let veto_leaving = Arc::new(AtomicBool::new(false));

    let mut sitemap = Sitemap::new();
    let home = sitemap
        .add_view("home", "home", AccessRule::Public)
        .unwrap();
    let login = sitemap
        .add_view("login", "login", AccessRule::Guest)
        .unwrap();
    sitemap
        .add_view(r"user/{id:\d+}", "user", AccessRule::Authenticated)
        .unwrap();
    sitemap
        .add_view("profile/{name}", "profile", AccessRule::Public)
        .unwrap();
    sitemap.add_view("door", "door", AccessRule::Public).unwrap();
    sitemap
        .add_view("broken", "broken", AccessRule::Public)
        .unwrap();
    sitemap.add_redirect("start", &home).unwrap();
    sitemap
        .set_standard_page(StandardPage::PublicHome, &home)
        .unwrap();
    sitemap
        .set_standard_page(StandardPage::Login, &login)
        .unwrap();
    let sitemap = Arc::new(sitemap);

    let mut callbacks = CallbackRegistry::new();
    {
        let after_log = log.clone();
        callbacks
            .register(
                CallbackTable::for_view::<HomeView>()
                    .on(CallbackPhase::AfterInbound, "shown", vec![], move |_view, event, _args| {
                        after_log.record(format!("home:after-inbound:{}", event.target().fragment()));
                    })
                    .unwrap()
                    .build(),
            )
            .unwrap();
    }
    {
        let enter_log = log.clone();
        callbacks
            .register(
                CallbackTable::for_view::<UserView>()
                    .on(
                        CallbackPhase::BeforeInbound,
                        "enter",
                        vec![route_param::<u64>("id")],
                        move |_view: &mut UserView, _event, args| {
                            enter_log.record(format!(
                                "user:before-inbound:{}",
                                args.get::<u64>(0).copied().unwrap_or_default()
                            ));
                        },
                    )
                    .unwrap()
                    .build(),
            )
            .unwrap();
    }
    {
        callbacks
            .register(
                CallbackTable::for_view::<ProfileView>()
                    .on(
                        CallbackPhase::BeforeInbound,
                        "enter",
                        vec![route_param::<u64>("name")],
                        |_view, _event, _args| {},
                    )
                    .unwrap()
                    .build(),
            )
            .unwrap();
    }
    {
        let door_log = log.clone();
        let flag = Arc::clone(&veto_leaving);
        callbacks
            .register(
                CallbackTable::for_view::<DoorView>()
                    .on(CallbackPhase::BeforeOutbound, "leave", vec![], move |_view, event, _args| {
                        door_log.record("door:before-outbound");
                        if flag.load(Ordering::SeqCst) {
                            event.cancel();
                        }
                    })
                    .unwrap()
                    .build(),
            )
            .unwrap();
    }

    let views = StaticViewProvider::new()
        .with("home", Box::new(HomeView))
        .with("login", Box::new(PlainView::new("login")))
        .with("user", Box::new(UserView::default()))
        .with("profile", Box::new(ProfileView))
        .with("door", Box::new(DoorView))
        .with("broken", Box::new(RootlessView));

    let navigator = Navigator::new(
        sitemap,
        Arc::new(callbacks),
        Arc::new(subject.clone()),
        Box::new(views),
        Box::new(RecordingSink::new(log.clone())),
        Box::new(location.clone()),
    );

    Harness {
        navigator,
        subject,
        log,
        location,
        veto_leaving,
    }
}

fn with_listeners(mut h: Harness) -> Harness {
    h.navigator
        .add_listener(Box::new(RecordingListener::new("A", h.log.clone())));
    h.navigator
        .add_listener(Box::new(RecordingListener::new("B", h.log.clone())));
    h
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commit path
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn committed_navigation_runs_phases_in_order() {
    let mut h = with_listeners(harness());

    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::Committed);

    assert_eq!(
        h.log.entries(),
        [
            "A:before-security-check",
            "B:before-security-check",
            "A:before-view-change",
            "B:before-view-change",
            "sink:change-view",
            "home:after-inbound:home",
            "A:after-view-change:home",
            "B:after-view-change:home",
        ]
    );
    assert_eq!(h.navigator.current().unwrap().fragment(), "home");
    assert!(h.navigator.previous().is_none());
}

#[test]
fn location_is_synchronized_without_events() {
    let mut h = harness();
    h.navigator.navigate_to("home").unwrap();

    assert_eq!(h.location.current(), "home");
    assert_eq!(h.location.last_fire_events(), Some(false));
}

#[test]
fn navigating_to_current_state_is_a_noop() {
    let mut h = with_listeners(harness());
    h.navigator.navigate_to("home").unwrap();
    h.log.clear();

    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::AlreadyCurrent);
    assert!(h.log.entries().is_empty());
}

#[test]
fn commit_updates_previous_state() {
    let mut h = harness();
    h.navigator.navigate_to("home").unwrap();
    h.navigator.navigate_to("door").unwrap();

    assert_eq!(h.navigator.current().unwrap().fragment(), "door");
    assert_eq!(h.navigator.previous().unwrap().fragment(), "home");
}

#[test]
fn inbound_callback_binds_converted_params() {
    let mut h = harness();
    h.subject.log_in();

    h.navigator.navigate_to("user/42").unwrap();
    assert!(h
        .log
        .entries()
        .contains(&"user:before-inbound:42".to_string()));
    assert_eq!(h.location.current(), "user/42");
}

#[test]
fn navigate_by_view_id_builds_fragment_from_params() {
    let mut h = harness();
    h.subject.log_in();

    let target = NavigationTarget::view("user", NavigationParams::new().with("id", "7"));
    h.navigator.navigate_to(target).unwrap();

    assert_eq!(h.navigator.current().unwrap().fragment(), "user/7");
    assert_eq!(h.location.current(), "user/7");
}

#[test]
fn redirect_commits_the_target_identity() {
    let mut h = harness();

    h.navigator.navigate_to("start").unwrap();

    let current = h.navigator.current().unwrap();
    assert_eq!(current.view_id().as_str(), "home");
    assert!(!current.node().is_redirect());
    assert_eq!(current.fragment(), "home");
}

#[test]
fn standard_page_navigation_commits() {
    let mut h = harness();
    let outcome = h.navigator.navigate_to(StandardPage::PublicHome).unwrap();
    assert_eq!(outcome, NavigationOutcome::Committed);
    assert_eq!(h.navigator.current().unwrap().view_id().as_str(), "home");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Failure paths leave the state machine untouched
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_fragment_is_page_not_found() {
    let mut h = harness();
    h.navigator.navigate_to("home").unwrap();

    let err = h.navigator.navigate_to("nowhere").unwrap_err();
    match err {
        NavigationError::PageNotFound(e) => {
            assert_eq!(e.requested, "nowhere");
            assert!(!e.known_patterns.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.navigator.current().unwrap().fragment(), "home");
}

#[test]
fn unauthorized_navigation_carries_the_target_and_preserves_state() {
    let mut h = with_listeners(harness());
    h.navigator.navigate_to("home").unwrap();
    h.log.clear();

    let err = h.navigator.navigate_to("user/42").unwrap_err();
    match err {
        NavigationError::Unauthorized { state, source } => {
            assert_eq!(state.fragment(), "user/42");
            assert_eq!(source, AccessDenied::NotAuthenticated);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Security listeners ran; nothing after the denial did.
    assert_eq!(
        h.log.entries(),
        ["A:before-security-check", "B:before-security-check"]
    );
    assert_eq!(h.navigator.current().unwrap().fragment(), "home");
    assert_eq!(h.location.current(), "home");
}

#[test]
fn denied_then_login_then_retry_succeeds() {
    let mut h = harness();

    assert!(matches!(
        h.navigator.navigate_to("user/9"),
        Err(NavigationError::Unauthorized { .. })
    ));

    h.subject.log_in();
    let outcome = h.navigator.navigate_to("user/9").unwrap();
    assert_eq!(outcome, NavigationOutcome::Committed);
    assert_eq!(h.navigator.current().unwrap().fragment(), "user/9");
}

#[test]
fn guest_route_denies_an_authenticated_subject() {
    let mut h = harness();
    h.subject.log_in();

    let err = h.navigator.navigate_to("login").unwrap_err();
    assert!(matches!(
        err,
        NavigationError::Unauthorized {
            source: AccessDenied::NotGuest,
            ..
        }
    ));
}

#[test]
fn unconvertible_param_is_an_invalid_route() {
    let mut h = harness();
    h.navigator.navigate_to("home").unwrap();

    let err = h.navigator.navigate_to("profile/bob").unwrap_err();
    match err {
        NavigationError::InvalidRoute(e) => {
            assert_eq!(e.fragment, "profile/bob");
            assert_eq!(e.source.param, "name");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.navigator.current().unwrap().fragment(), "home");
}

#[test]
fn missing_root_is_fatal_and_preserves_state() {
    let mut h = harness();
    h.navigator.navigate_to("home").unwrap();

    let err = h.navigator.navigate_to("broken").unwrap_err();
    assert!(matches!(err, NavigationError::MissingRoot { .. }));
    assert_eq!(h.navigator.current().unwrap().fragment(), "home");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn cancel_during_before_view_change_stops_later_listeners() {
    let mut h = harness();
    h.navigator.add_listener(Box::new(RecordingListener::cancelling(
        "A",
        h.log.clone(),
        CancelPoint::BeforeViewChange,
    )));
    h.navigator
        .add_listener(Box::new(RecordingListener::new("B", h.log.clone())));

    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::Cancelled);

    // B saw the security phase, but never the view-change phase, and no
    // after-view-change fired anywhere.
    assert_eq!(
        h.log.entries(),
        [
            "A:before-security-check",
            "B:before-security-check",
            "A:before-view-change",
        ]
    );
    assert!(h.navigator.current().is_none());
    assert_eq!(h.location.last_fire_events(), None);
}

#[test]
fn cancel_during_security_check_stops_everything() {
    let mut h = harness();
    h.navigator.add_listener(Box::new(RecordingListener::cancelling(
        "A",
        h.log.clone(),
        CancelPoint::BeforeSecurityCheck,
    )));
    h.navigator
        .add_listener(Box::new(RecordingListener::new("B", h.log.clone())));

    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::Cancelled);
    assert_eq!(h.log.entries(), ["A:before-security-check"]);
}

#[test]
fn outbound_view_can_veto_leaving() {
    let mut h = harness();
    h.navigator.navigate_to("door").unwrap();
    h.log.clear();

    h.veto_leaving.store(true, Ordering::SeqCst);
    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::Cancelled);
    assert!(h
        .log
        .entries()
        .contains(&"door:before-outbound".to_string()));
    assert_eq!(h.navigator.current().unwrap().fragment(), "door");

    // Clearing the veto lets the same navigation through.
    h.veto_leaving.store(false, Ordering::SeqCst);
    let outcome = h.navigator.navigate_to("home").unwrap();
    assert_eq!(outcome, NavigationOutcome::Committed);
}

#[test]
fn removed_listener_no_longer_fires() {
    let mut h = harness();
    let handle = h
        .navigator
        .add_listener(Box::new(RecordingListener::new("A", h.log.clone())));
    h.navigator
        .add_listener(Box::new(RecordingListener::new("B", h.log.clone())));

    assert!(h.navigator.remove_listener(handle));
    assert!(!h.navigator.remove_listener(handle));

    h.navigator.navigate_to("home").unwrap();
    assert!(h
        .log
        .entries()
        .iter()
        .all(|entry| !entry.starts_with("A:")));
}
