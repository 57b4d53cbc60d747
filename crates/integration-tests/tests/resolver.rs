//! Resolver behavior against a scripted backend.
//!
//! Covers cache idempotence, guest precedence, corrupt-record self-heal,
//! in-flight coalescing, and fail-closed profile handling. All tests run on
//! tokio's paused clock so the resolver's fixed windows (10 s TTL, 2 s
//! in-flight wait, 100 ms poll) are exercised deterministically.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use aduana_integration_tests::{SessionScript, TestContext, profile_row, session};
use aduana_identity::{Identity, LocalStore, ResolveError, store::keys};

#[tokio::test(start_paused = true)]
async fn resolve_is_idempotent_within_cache_ttl() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", Some("co-1"));

    let first = ctx.resolver.resolve().await.unwrap();
    let second = ctx.resolver.resolve().await.unwrap();

    assert_eq!(first, second);
    // The second call is served from cache without any I/O.
    assert_eq!(ctx.backend.get_session_calls(), 1);
    assert_eq!(ctx.backend.select_calls("profiles"), 1);
}

#[tokio::test(start_paused = true)]
async fn cache_expires_after_ttl() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);

    ctx.resolver.resolve().await.unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;
    ctx.resolver.resolve().await.unwrap();

    assert_eq!(ctx.backend.get_session_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_re_resolution() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);

    ctx.resolver.resolve().await.unwrap();
    ctx.resolver.invalidate();
    ctx.resolver.resolve().await.unwrap();

    assert_eq!(ctx.backend.get_session_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn guest_record_wins_over_remote_session() {
    let ctx = TestContext::new();
    // A remote session exists, but a valid guest record takes precedence.
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);
    let guest = ctx.guests.create().unwrap();

    let identity = ctx.resolver.resolve().await.unwrap();

    assert_eq!(identity, Identity::Guest(guest));
    assert!(identity.is_verified());
    assert_eq!(ctx.backend.get_session_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn corrupt_guest_record_self_heals_and_falls_through() {
    let ctx = TestContext::new();
    ctx.store.set(keys::GUEST_USER, "{definitely not json").unwrap();

    let identity = ctx.resolver.resolve().await;

    // The corrupt record is deleted and resolution fell through to the
    // remote path (scripted as signed out).
    assert_eq!(identity, None);
    assert_eq!(ctx.store.get(keys::GUEST_USER).unwrap(), None);
    assert_eq!(ctx.backend.get_session_calls(), 1);

    // A fresh cycle confirms the store stays empty and the remote path is
    // consulted again.
    ctx.resolver.invalidate();
    assert_eq!(ctx.resolver.resolve().await, None);
    assert_eq!(ctx.store.get(keys::GUEST_USER).unwrap(), None);
    assert_eq!(ctx.backend.get_session_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn guest_record_missing_marker_is_deleted() {
    let ctx = TestContext::new();
    ctx.store
        .set(
            keys::GUEST_USER,
            r#"{"id":"g-1","email":"guest-g1@invitado.local"}"#,
        )
        .unwrap();

    assert_eq!(ctx.resolver.resolve().await, None);
    assert_eq!(ctx.store.get(keys::GUEST_USER).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_resolves_coalesce_onto_one_remote_call() {
    let ctx = TestContext::new();
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);
    ctx.backend.set_session_delay(Duration::from_millis(250));

    let (first, second) = tokio::join!(ctx.resolver.resolve(), ctx.resolver.resolve());

    assert_eq!(ctx.backend.get_session_calls(), 1);
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn failed_profile_fetch_fails_closed() {
    let ctx = TestContext::new();
    ctx.backend
        .script_session(SessionScript::Active(session("u-1", "ops@despacho.example", true)));
    ctx.backend.fail_table("profiles");

    let identity = ctx.resolver.resolve().await;

    // No partial identity, ever.
    assert_eq!(identity, None);
    assert!(matches!(
        ctx.resolver.last_error(),
        Some(ResolveError::Profile(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn missing_profile_row_fails_closed() {
    let ctx = TestContext::new();
    ctx.backend
        .script_session(SessionScript::Active(session("u-1", "ops@despacho.example", true)));
    // No profiles seeded at all.

    assert_eq!(ctx.resolver.resolve().await, None);
    assert!(matches!(
        ctx.resolver.last_error(),
        Some(ResolveError::Profile(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_not_cached() {
    let ctx = TestContext::new();
    ctx.backend.script_session(SessionScript::Transport);

    assert_eq!(ctx.resolver.resolve().await, None);
    assert!(matches!(
        ctx.resolver.last_error(),
        Some(ResolveError::Remote(_))
    ));

    // The service recovers; the next resolve reaches it immediately, with
    // no TTL wait, because failures are never cached.
    ctx.sign_in_operator("u-1", "ops@despacho.example", None);
    assert!(ctx.resolver.resolve().await.is_some());
    assert_eq!(ctx.backend.get_session_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn definitive_signed_out_is_cached() {
    let ctx = TestContext::new();

    assert_eq!(ctx.resolver.resolve().await, None);
    assert_eq!(ctx.resolver.resolve().await, None);

    // "No session" is a definitive answer and is served from cache.
    assert_eq!(ctx.backend.get_session_calls(), 1);
    assert_eq!(ctx.resolver.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn company_prefetch_failure_is_non_fatal() {
    let ctx = TestContext::new();
    ctx.backend
        .script_session(SessionScript::Active(session("u-1", "ops@despacho.example", true)));
    ctx.backend.seed_table(
        "profiles",
        vec![profile_row("u-1", "ops@despacho.example", "admin", Some("co-1"))],
    );
    ctx.backend.fail_table("companies");

    let identity = ctx.resolver.resolve().await.unwrap();

    // The identity still carries the company reference; details stay lazy.
    assert_eq!(identity.company_id().map(aduana_core::CompanyId::as_str), Some("co-1"));
}

#[tokio::test(start_paused = true)]
async fn unverified_session_passes_through() {
    let ctx = TestContext::new();
    ctx.backend
        .script_session(SessionScript::Active(session("u-1", "new@despacho.example", false)));
    ctx.backend.seed_table(
        "profiles",
        vec![profile_row("u-1", "new@despacho.example", "viewer", None)],
    );

    let identity = ctx.resolver.resolve().await.unwrap();
    assert!(!identity.is_verified());
}
