//! Route guard behavior: retry-then-redirect, safety timeout, public
//! paths, the pending-verification interstitial, and the verified-once
//! short-circuit. Timing assertions run on tokio's paused clock.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::time::Instant;

use aduana_integration_tests::{SessionScript, TestContext, profile_row, session};
use aduana_identity::{LocalStore, RouteState, store::keys};

#[tokio::test(start_paused = true)]
async fn verified_identity_is_allowed() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", Some("co-1"));

    let decision = ctx.guard.check("/shipments").await;

    assert_eq!(decision.state, RouteState::Allowed);
    assert_eq!(
        decision.identity.unwrap().email().as_str(),
        "ops@despacho.example"
    );
}

#[tokio::test(start_paused = true)]
async fn guest_identity_is_allowed() {
    let ctx = TestContext::new();
    ctx.guests.create().unwrap();

    let decision = ctx.guard.check("/shipments").await;

    assert_eq!(decision.state, RouteState::Allowed);
    assert!(decision.identity.unwrap().is_guest());
}

#[tokio::test(start_paused = true)]
async fn unverified_identity_hits_interstitial() {
    let ctx = TestContext::new();
    ctx.backend
        .script_session(SessionScript::Active(session("u-1", "new@despacho.example", false)));
    ctx.backend.seed_table(
        "profiles",
        vec![profile_row("u-1", "new@despacho.example", "viewer", None)],
    );

    let decision = ctx.guard.check("/shipments").await;

    assert_eq!(decision.state, RouteState::PendingVerification);
    assert!(decision.identity.is_some());
}

#[tokio::test(start_paused = true)]
async fn login_and_register_are_always_allowed() {
    let ctx = TestContext::new();
    // Even a hung backend cannot block the login page.
    ctx.backend.script_session(SessionScript::Hang);

    for path in ["/login", "/register"] {
        let decision = ctx.guard.check(path).await;
        assert_eq!(decision.state, RouteState::Allowed);
        assert_eq!(decision.identity, None);
    }

    // No identity check was performed at all.
    assert_eq!(ctx.backend.get_session_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn three_attempts_then_redirect_with_route_persisted() {
    let ctx = TestContext::new();
    // The service consistently reports no session.
    let start = Instant::now();

    let decision = ctx.guard.check("/declarations/42").await;

    assert_eq!(decision.state, RouteState::RedirectLogin);
    assert_eq!(decision.identity, None);

    // Exactly three resolution attempts, ~100ms apart.
    assert_eq!(ctx.guard.attempts_for("/declarations/42"), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");

    // The definitive "no session" answer was cached after the first call.
    assert_eq!(ctx.backend.get_session_calls(), 1);

    // The attempted path is preserved for post-login restoration.
    assert_eq!(
        ctx.store.get(keys::LAST_VISITED_ROUTE).unwrap().as_deref(),
        Some("/declarations/42")
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_against_the_service() {
    let ctx = TestContext::new();
    ctx.backend.script_session(SessionScript::Transport);

    let decision = ctx.guard.check("/shipments").await;

    assert_eq!(decision.state, RouteState::RedirectLogin);
    // Transport failures are not cached, so every attempt reached the
    // service.
    assert_eq!(ctx.backend.get_session_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn safety_timeout_forces_redirect_on_hung_backend() {
    let ctx = TestContext::new();
    ctx.backend.script_session(SessionScript::Hang);

    let start = Instant::now();
    let decision = ctx.guard.check("/settlements").await;
    let elapsed = start.elapsed();

    assert_eq!(decision.state, RouteState::RedirectLogin);
    assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");

    // Destination is still preserved.
    assert_eq!(
        ctx.store.get(keys::LAST_VISITED_ROUTE).unwrap().as_deref(),
        Some("/settlements")
    );
}

#[tokio::test(start_paused = true)]
async fn hung_resolution_does_not_wedge_later_navigations() {
    let ctx = TestContext::new();
    ctx.backend.script_session(SessionScript::Hang);
    assert_eq!(ctx.guard.check("/shipments").await.state, RouteState::RedirectLogin);

    // The backend recovers; the dropped in-flight call must not block the
    // next navigation from resolving.
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);
    let decision = ctx.guard.check("/shipments").await;
    assert_eq!(decision.state, RouteState::Allowed);
}

#[tokio::test(start_paused = true)]
async fn allowed_route_short_circuits_re_renders() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);

    let first = ctx.guard.check("/shipments").await;
    assert_eq!(first.state, RouteState::Allowed);
    let calls_after_first = ctx.backend.get_session_calls();

    // Even with the backend now hanging, a re-render of the same path for
    // the same identity is allowed without re-verification.
    ctx.backend.script_session(SessionScript::Hang);
    let second = ctx.guard.check("/shipments").await;

    assert_eq!(second.state, RouteState::Allowed);
    assert_eq!(second.identity, first.identity);
    assert_eq!(ctx.backend.get_session_calls(), calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_the_short_circuit() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);
    assert_eq!(ctx.guard.check("/shipments").await.state, RouteState::Allowed);

    // Sign-out: caches dropped, the service reports no session.
    ctx.backend.script_session(SessionScript::SignedOut);
    ctx.resolver.invalidate();
    ctx.guard.reset();

    let decision = ctx.guard.check("/shipments").await;
    assert_eq!(decision.state, RouteState::RedirectLogin);
}

#[tokio::test(start_paused = true)]
async fn sign_in_restores_last_visited_route() {
    let ctx = TestContext::new();

    // Unauthenticated navigation records the destination...
    assert_eq!(
        ctx.guard.check("/declarations/42").await.state,
        RouteState::RedirectLogin
    );

    // ...and a successful sign-in consumes it exactly once.
    assert_eq!(
        ctx.guard.take_last_route().unwrap().as_deref(),
        Some("/declarations/42")
    );
    assert_eq!(ctx.guard.take_last_route().unwrap(), None);
}
