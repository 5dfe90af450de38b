//! Integration tests for consumer rendering, refetching and cancellation
//!
//! Every test drives a `RequestHooks` instance with a scripted
//! `MockTransport`; held calls (`MockTransport::hold`) keep a request in
//! flight so supersession and unmount can be observed.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use reqhook_core::{
    fingerprint, Cache, CacheDump, CacheStore, ConsumerState, DescriptorOverride, Fingerprint,
    OptionsOverride, RefetchArgument, RequestDescriptor, RequestError, Response,
};
use reqhook_runtime::{HooksConfig, RenderMode, RequestHooks};
use reqhook_testing::assertions::{assert_failed_with, assert_settled_with};
use reqhook_testing::helpers::{json_response, status_error, wait_for_state};
use reqhook_testing::mocks::MockTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

fn hooks_with(transport: &MockTransport) -> RequestHooks {
    RequestHooks::new(HooksConfig::new().with_transport(transport.clone()))
}

async fn wait_for_calls(transport: &MockTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while transport.call_count() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("transport was not called in time");
}

// ============================================================================
// First render and cache reuse
// ============================================================================

#[tokio::test]
async fn test_first_render_loads_then_settles_and_caches() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (state, _refetch, _cancel) = consumer.render("/todos/1", OptionsOverride::none());
    assert_eq!(state, ConsumerState::loading());

    consumer.settled().await;
    let state = consumer.state().unwrap();
    assert_settled_with(&state, &json!({"id": 1}));
    assert_eq!(state.response.as_ref().map(|r| r.status), Some(200));

    let dump = hooks.cache().dump();
    assert_eq!(dump.len(), 1);
    let record = dump.iter().next().unwrap();
    assert_eq!(record.key, fingerprint(&RequestDescriptor::get("/todos/1")));
    assert_eq!(record.value.data, json!({"id": 1}));
    assert!(record.value.config.is_none());
}

#[tokio::test]
async fn test_second_consumer_starts_settled_from_cache() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut first = hooks.consumer();
    let _ = first.render("/todos/1", OptionsOverride::none());
    first.settled().await;

    let mut second = hooks.consumer();
    let (state, _, _) = second.render("/todos/1", OptionsOverride::none());
    assert_settled_with(&state, &json!({"id": 1}));

    second.settled().await;
    assert_eq!(transport.call_count(), 1);
    assert_settled_with(&second.state().unwrap(), &json!({"id": 1}));
}

#[tokio::test]
async fn test_use_cache_false_skips_cached_initial_state() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);
    hooks
        .cache()
        .store(&RequestDescriptor::get("/todos/1"), json_response(json!("stale")));

    let mut consumer = hooks.consumer();
    let (state, _, _) = consumer.render("/todos/1", OptionsOverride::none().use_cache(false));
    assert_eq!(state, ConsumerState::loading());

    consumer.settled().await;
    assert_settled_with(&consumer.state().unwrap(), &json!({"id": 1}));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_disabled_cache_always_hits_the_transport() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = RequestHooks::new(
        HooksConfig::new()
            .with_transport(transport.clone())
            .with_cache(Cache::Disabled),
    );

    for _ in 0..2 {
        let mut consumer = hooks.consumer();
        let (state, _, _) = consumer.render("/todos/1", OptionsOverride::none());
        assert!(state.loading);
        consumer.settled().await;
    }

    assert_eq!(transport.call_count(), 2);
    assert!(hooks.serialize_cache().await.is_empty());
}

#[tokio::test]
async fn test_failed_request_stores_the_error() {
    let transport = MockTransport::new();
    transport.respond(
        "/broken",
        Err(status_error(500, json!({"message": "boom"}))),
    );
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let _ = consumer.render("/broken", OptionsOverride::none());
    consumer.settled().await;

    let state = consumer.state().unwrap();
    assert_failed_with(&state, "ERR_BAD_RESPONSE");
    assert_eq!(state.error.as_ref().and_then(RequestError::http_status), Some(500));
    assert!(hooks.cache().is_empty());
}

// ============================================================================
// Effect re-runs
// ============================================================================

#[tokio::test]
async fn test_equal_inputs_do_not_rerun_the_request() {
    let transport = MockTransport::new();
    transport.respond("/todos", Ok(json_response(json!([1, 2]))));
    let hooks = RequestHooks::new(
        HooksConfig::new()
            .with_transport(transport.clone())
            .with_cache(Cache::Disabled),
    );

    let mut consumer = hooks.consumer();
    let descriptor = RequestDescriptor::get("/todos")
        .with_param("page", "1")
        .with_header("accept", "application/json");
    let _ = consumer.render(&descriptor, OptionsOverride::none());
    consumer.settled().await;

    let rebuilt = RequestDescriptor::get("/todos")
        .with_header("accept", "application/json")
        .with_param("page", "1");
    let (state, _, _) = consumer.render(rebuilt, OptionsOverride::none().auto_cancel(true));
    consumer.settled().await;

    assert_eq!(transport.call_count(), 1);
    assert_settled_with(&state, &json!([1, 2]));
}

#[tokio::test]
async fn test_changed_options_rerun_the_request() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let _ = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;

    let _ = consumer.render("/todos/1", OptionsOverride::none().use_cache(false));
    consumer.settled().await;

    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_configure_reruns_the_request_with_new_bindings() {
    let first = MockTransport::new();
    first.respond("/todos/1", Ok(json_response(json!("first"))));
    let hooks = hooks_with(&first);

    let mut consumer = hooks.consumer();
    let _ = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;

    let second = MockTransport::new();
    second.respond("/todos/1", Ok(json_response(json!("second"))));
    hooks.configure(
        HooksConfig::new()
            .with_transport(second.clone())
            .with_cache(Cache::lru(10)),
    );

    let _ = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;

    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
    assert_settled_with(&consumer.state().unwrap(), &json!("second"));
}

#[tokio::test]
async fn test_configured_defaults_apply_to_new_consumers() {
    let transport = MockTransport::new();
    let hooks = RequestHooks::new(
        HooksConfig::new()
            .with_transport(transport.clone())
            .with_default_options(OptionsOverride::none().manual(true)),
    );

    let mut consumer = hooks.consumer();
    let (state, _, _) = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;

    assert_eq!(state, ConsumerState::idle());
    assert_eq!(transport.call_count(), 0);

    hooks.reset_configure();
    assert!(!hooks.default_options().manual);
}

// ============================================================================
// Supersession and cancellation
// ============================================================================

#[tokio::test]
async fn test_new_descriptor_supersedes_the_in_flight_request() {
    let transport = MockTransport::new();
    let mut stale = transport.hold("/a");
    transport.respond("/b", Ok(json_response(json!("b"))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let _ = consumer.render("/a", OptionsOverride::none());
    wait_for_calls(&transport, 1).await;

    let _ = consumer.render("/b", OptionsOverride::none());
    consumer.settled().await;

    tokio::time::timeout(Duration::from_secs(1), stale.cancelled())
        .await
        .expect("superseded request was not aborted");
    assert!(!stale.release(Ok(json_response(json!("a")))));
    assert_settled_with(&consumer.state().unwrap(), &json!("b"));
}

#[tokio::test]
async fn test_auto_cancel_off_lets_the_previous_request_finish() {
    let transport = MockTransport::new();
    let first = transport.hold("/a");
    transport.respond("/b", Ok(json_response(json!("b"))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let options = OptionsOverride::none().auto_cancel(false);
    let _ = consumer.render("/a", options);
    wait_for_calls(&transport, 1).await;

    let _ = consumer.render("/b", options);
    consumer.settled().await;

    assert!(!first.is_closed());
    assert!(first.release(Ok(json_response(json!("a")))));
}

#[tokio::test]
async fn test_unmount_aborts_and_discards_the_result() {
    let transport = MockTransport::new();
    let mut gate = transport.hold("/slow");
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let _ = consumer.render("/slow", OptionsOverride::none());
    let receiver = consumer.subscribe().unwrap();
    wait_for_calls(&transport, 1).await;

    consumer.unmount();

    tokio::time::timeout(Duration::from_secs(1), gate.cancelled())
        .await
        .expect("unmount did not abort the request");
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(*receiver.borrow(), ConsumerState::loading());
    assert!(hooks.cache().is_empty());
}

#[tokio::test]
async fn test_cancel_aborts_without_touching_state() {
    let transport = MockTransport::new();
    let mut gate = transport.hold("/slow");
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, _, cancel) = consumer.render("/slow", OptionsOverride::none());
    wait_for_calls(&transport, 1).await;

    assert!(cancel.cancel());
    assert!(!cancel.cancel());
    gate.cancelled().await;
    consumer.settled().await;

    assert_eq!(consumer.state().unwrap(), ConsumerState::loading());
}

// ============================================================================
// Refetch
// ============================================================================

#[tokio::test]
async fn test_manual_consumer_waits_for_refetch() {
    let transport = MockTransport::new();
    let gate = transport.hold("/todos/1");
    let hooks = hooks_with(&transport);
    hooks
        .cache()
        .store(&RequestDescriptor::get("/todos/1"), json_response(json!("cached")));

    let mut consumer = hooks.consumer();
    let (state, refetch, _) = consumer.render("/todos/1", OptionsOverride::none().manual(true));
    assert_eq!(state, ConsumerState::idle());
    consumer.settled().await;
    assert_eq!(transport.call_count(), 0);

    let mut receiver = consumer.subscribe().unwrap();
    let running = tokio::spawn(async move { refetch.run().await });

    let loading = wait_for_state(&mut receiver, |state| state.loading).await;
    assert!(loading.is_some());

    assert!(gate.release(Ok(json_response(json!("fresh")))));
    let response = running.await.unwrap().unwrap();
    assert_eq!(response.data, json!("fresh"));

    assert_settled_with(&consumer.state().unwrap(), &json!("fresh"));
    let cached = hooks.cache().lookup(&RequestDescriptor::get("/todos/1"));
    assert_eq!(cached.map(|r| r.data), Some(json!("fresh")));
}

#[tokio::test]
async fn test_refetch_bypasses_cache_but_writes_it() {
    let transport = MockTransport::new();
    transport.respond_once("/todos/1", Ok(json_response(json!({"v": 1}))));
    transport.respond("/todos/1", Ok(json_response(json!({"v": 2}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;
    assert_settled_with(&consumer.state().unwrap(), &json!({"v": 1}));

    let response = refetch.run().await.unwrap();
    assert_eq!(response.data, json!({"v": 2}));
    assert_eq!(transport.call_count(), 2);
    assert_settled_with(&consumer.state().unwrap(), &json!({"v": 2}));

    let cached = hooks.cache().lookup(&RequestDescriptor::get("/todos/1"));
    assert_eq!(cached.map(|r| r.data), Some(json!({"v": 2})));
}

#[tokio::test]
async fn test_refetch_can_opt_back_into_the_cache() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/todos/1", OptionsOverride::none());
    consumer.settled().await;

    let response = refetch
        .call(RefetchArgument::None, OptionsOverride::none().use_cache(true))
        .await
        .unwrap();

    assert_eq!(response.data, json!({"id": 1}));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_cache_satisfied_refetch_still_supersedes_the_automatic_request() {
    let transport = MockTransport::new();
    let mut gate = transport.hold("/todos/1");
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/todos/1", OptionsOverride::none().use_cache(false));
    wait_for_calls(&transport, 1).await;

    hooks
        .cache()
        .store(&RequestDescriptor::get("/todos/1"), json_response(json!("cached")));
    let response = refetch
        .call((), OptionsOverride::none().use_cache(true))
        .await
        .unwrap();
    assert_eq!(response.data, json!("cached"));

    gate.cancelled().await;
    consumer.settled().await;
    assert_settled_with(&consumer.state().unwrap(), &json!("cached"));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_refetch_override_merges_over_the_current_descriptor() {
    let transport = MockTransport::new();
    transport.respond("/todos/2", Ok(json_response(json!({"id": 2}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let base = RequestDescriptor::get("/todos/1").with_header("x-trace", "abc");
    let (_, refetch, _) = consumer.render(base, OptionsOverride::none().manual(true));

    let response = refetch
        .call("/todos/2", OptionsOverride::none())
        .await
        .unwrap();
    assert_eq!(response.data, json!({"id": 2}));

    let call = transport.calls().pop().unwrap();
    assert_eq!(call.url, "/todos/2");
    assert_eq!(call.headers.get("x-trace").map(String::as_str), Some("abc"));
    assert_eq!(refetch.descriptor().url, "/todos/1");
}

#[tokio::test]
async fn test_refetch_from_an_event_handler_uses_the_current_descriptor() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/todos/1", OptionsOverride::none().manual(true));

    refetch
        .call(RefetchArgument::UiEvent, OptionsOverride::none())
        .await
        .unwrap();

    assert_eq!(transport.calls_to("/todos/1"), 1);
}

#[tokio::test]
async fn test_refetch_with_params_override() {
    let transport = MockTransport::new();
    transport.respond("/search", Ok(json_response(json!([]))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let base = RequestDescriptor::get("/search").with_param("q", "rust");
    let (_, refetch, _) = consumer.render(base, OptionsOverride::none().manual(true));

    let overrides = DescriptorOverride::default()
        .with_params([("q".to_owned(), "tokio".to_owned())].into_iter().collect());
    refetch.call(overrides, OptionsOverride::none()).await.unwrap();

    let call = transport.calls().pop().unwrap();
    assert_eq!(call.params.get("q").map(String::as_str), Some("tokio"));
}

#[tokio::test]
async fn test_refetch_error_then_success_clears_the_error() {
    let transport = MockTransport::new();
    transport.respond_once("/flaky", Err(RequestError::network("connection reset")));
    transport.respond("/flaky", Ok(json_response(json!("ok"))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/flaky", OptionsOverride::none().manual(true));

    let error = refetch.run().await.unwrap_err();
    assert_eq!(error.code(), "ERR_NETWORK");
    assert_failed_with(&consumer.state().unwrap(), "ERR_NETWORK");

    refetch.run().await.unwrap();
    assert_settled_with(&consumer.state().unwrap(), &json!("ok"));
}

#[tokio::test]
async fn test_superseded_refetch_reports_cancellation() {
    let transport = MockTransport::new();
    let _gate = transport.hold("/slow");
    transport.respond("/fast", Ok(json_response(json!("fast"))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/slow", OptionsOverride::none().manual(true));

    let slow = {
        let refetch = refetch.clone();
        tokio::spawn(async move { refetch.run().await })
    };
    wait_for_calls(&transport, 1).await;

    refetch.call("/fast", OptionsOverride::none()).await.unwrap();

    let outcome = slow.await.unwrap();
    assert!(matches!(outcome, Err(RequestError::Cancelled)));
    assert_settled_with(&consumer.state().unwrap(), &json!("fast"));
}

// ============================================================================
// Ordering under a multi-threaded runtime
// ============================================================================

/// Store whose writes block for a while and whose reads always hit
struct SlowWriteStore;

impl CacheStore for SlowWriteStore {
    fn get(&self, _key: &Fingerprint) -> Option<Response> {
        Some(Response::ok(json!("cached")))
    }

    fn set(&self, _key: Fingerprint, _value: Response) -> Option<Fingerprint> {
        std::thread::sleep(Duration::from_millis(200));
        None
    }

    fn dump(&self) -> CacheDump {
        CacheDump::default()
    }

    fn load(&self, _dump: CacheDump) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_superseded_result_never_overwrites_a_cached_refetch() {
    let transport = MockTransport::new();
    transport.respond("/x", Ok(json_response(json!("network"))));
    let hooks = RequestHooks::new(
        HooksConfig::new()
            .with_transport(transport.clone())
            .with_cache(Cache::with_store(Arc::new(SlowWriteStore))),
    );

    let mut consumer = hooks.consumer();
    let (_, refetch, _) = consumer.render("/x", OptionsOverride::none().use_cache(false));
    wait_for_calls(&transport, 1).await;

    // The automatic request is now blocked writing its result to the cache
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = refetch
        .call((), OptionsOverride::none().use_cache(true))
        .await
        .unwrap();
    assert_eq!(response.data, json!("cached"));

    consumer.settled().await;
    assert_settled_with(&consumer.state().unwrap(), &json!("cached"));
}

// ============================================================================
// Rendering without a runtime
// ============================================================================

#[test]
fn test_render_outside_a_runtime_starts_nothing() {
    let transport = MockTransport::new();
    transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
    let hooks = hooks_with(&transport);

    let mut consumer = hooks.consumer();
    let (state, _, _) = consumer.render("/todos/1", OptionsOverride::none());

    assert_eq!(state, ConsumerState::loading());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn test_server_render_outside_a_runtime_queues_nothing() {
    let transport = MockTransport::new();
    let hooks = RequestHooks::new(
        HooksConfig::new()
            .with_transport(transport.clone())
            .with_render_mode(RenderMode::Server),
    );

    let mut consumer = hooks.consumer();
    let (state, _, _) = consumer.render("/todos/1", OptionsOverride::none());

    assert_eq!(state, ConsumerState::loading());
    assert_eq!(hooks.ssr_pending(), 0);
}
