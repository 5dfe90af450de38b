//! # Reqhook Testing
//!
//! Testing utilities and helpers for reqhook.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Test helpers and builders
//! - Property-based testing strategies
//! - Assertion helpers for reducers and consumer state
//!
//! ## Example
//!
//! ```
//! use reqhook_core::environment::Transport;
//! use reqhook_core::RequestDescriptor;
//! use reqhook_testing::helpers::json_response;
//! use reqhook_testing::mocks::MockTransport;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.respond("/todos/1", Ok(json_response(json!({"id": 1}))));
//!
//! let response = transport.execute(RequestDescriptor::get("/todos/1")).await;
//! assert_eq!(response.map(|r| r.data).ok(), Some(json!({"id": 1})));
//! assert_eq!(transport.call_count(), 1);
//! # });
//! ```

use chrono::{DateTime, Utc};
use reqhook_core::environment::Clock;


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use reqhook_core::environment::{Transport, TransportFuture};
    use reqhook_core::state::{Dispatch, RequestAction};
    use reqhook_core::{RequestDescriptor, RequestError, Response};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::oneshot;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use reqhook_testing::mocks::FixedClock;
    /// use reqhook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    type Outcome = Result<Response, RequestError>;

    enum Scripted {
        Ready(Outcome),
        Held(oneshot::Receiver<Outcome>),
    }

    #[derive(Default)]
    struct MockState {
        persistent: HashMap<String, Outcome>,
        queued: HashMap<String, VecDeque<Scripted>>,
        calls: Vec<RequestDescriptor>,
    }

    /// Scripted in-memory transport
    ///
    /// Responses are keyed by URL:
    ///
    /// - [`respond`](Self::respond) answers every call to a URL
    /// - [`respond_once`](Self::respond_once) answers the next call only and
    ///   takes precedence
    /// - [`hold`](Self::hold) makes the next call wait until the returned
    ///   [`MockGate`] is released; a held call resolves as cancelled as soon
    ///   as its abort signal fires
    ///
    /// Immediate answers ignore the abort signal, like a transport that does
    /// not support cancellation. Calls to unknown URLs fail with a network
    /// error. Clones share scripts and the call log.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        /// Create a transport with no scripted responses
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Answer every call to `url` with `outcome`
        pub fn respond(&self, url: impl Into<String>, outcome: Outcome) {
            self.lock().persistent.insert(url.into(), outcome);
        }

        /// Answer the next call to `url` with `outcome`
        pub fn respond_once(&self, url: impl Into<String>, outcome: Outcome) {
            self.lock()
                .queued
                .entry(url.into())
                .or_default()
                .push_back(Scripted::Ready(outcome));
        }

        /// Hold the next call to `url` until the gate is released
        #[must_use]
        pub fn hold(&self, url: impl Into<String>) -> MockGate {
            let (sender, receiver) = oneshot::channel();
            self.lock()
                .queued
                .entry(url.into())
                .or_default()
                .push_back(Scripted::Held(receiver));
            MockGate { sender }
        }

        /// Every request received so far
        #[must_use]
        pub fn calls(&self) -> Vec<RequestDescriptor> {
            self.lock().calls.clone()
        }

        /// Number of requests received so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.lock().calls.len()
        }

        /// Number of requests received for `url`
        #[must_use]
        pub fn calls_to(&self, url: &str) -> usize {
            self.lock().calls.iter().filter(|call| call.url == url).count()
        }
    }

    impl Transport for MockTransport {
        fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_> {
            let scripted = {
                let mut state = self.lock();
                state.calls.push(request.clone());

                let queued = state
                    .queued
                    .get_mut(&request.url)
                    .and_then(VecDeque::pop_front);
                queued.or_else(|| state.persistent.get(&request.url).cloned().map(Scripted::Ready))
            };

            Box::pin(async move {
                match scripted {
                    None => Err(RequestError::network(format!(
                        "No mock response for {}",
                        request.url
                    ))),
                    Some(Scripted::Ready(outcome)) => outcome.map(|r| r.with_config(request)),
                    Some(Scripted::Held(receiver)) => {
                        let released = async {
                            receiver
                                .await
                                .unwrap_or_else(|_| Err(RequestError::network("Mock gate dropped")))
                        };
                        let outcome = match request.signal.clone() {
                            Some(signal) => {
                                tokio::select! {
                                    biased;
                                    () = signal.aborted() => Err(RequestError::Cancelled),
                                    outcome = released => outcome,
                                }
                            }
                            None => released.await,
                        };
                        outcome.map(|r| r.with_config(request))
                    }
                }
            })
        }
    }

    /// Release handle for a held mock call
    #[derive(Debug)]
    pub struct MockGate {
        sender: oneshot::Sender<Outcome>,
    }

    impl MockGate {
        /// Let the held call finish with `outcome`
        ///
        /// Returns `false` if the call is no longer waiting (it was cancelled
        /// or never made).
        pub fn release(self, outcome: Outcome) -> bool {
            self.sender.send(outcome).is_ok()
        }

        /// Whether the held call has stopped waiting
        #[must_use]
        pub fn is_closed(&self) -> bool {
            self.sender.is_closed()
        }

        /// Wait until the held call stops waiting without being released
        pub async fn cancelled(&mut self) {
            self.sender.closed().await;
        }
    }

    /// Dispatch target that records every action
    #[derive(Debug, Default)]
    pub struct RecordingDispatch {
        actions: Mutex<Vec<RequestAction>>,
    }

    impl RecordingDispatch {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Actions received so far
        #[must_use]
        pub fn actions(&self) -> Vec<RequestAction> {
            self.actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl Dispatch for RecordingDispatch {
        fn dispatch(&self, action: RequestAction) {
            self.actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(action);
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use reqhook_core::{ConsumerState, RequestError, Response};
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::watch;

    /// A `200 OK` response with a JSON body
    #[must_use]
    pub fn json_response(data: Value) -> Response {
        Response::ok(data).with_header("content-type", "application/json")
    }

    /// A status error carrying a JSON body
    #[must_use]
    pub fn status_error(status: u16, data: Value) -> RequestError {
        RequestError::status(Response::new(data, status))
    }

    /// Wait until the state satisfies `predicate`, up to one second
    ///
    /// Returns the matching state, or `None` on timeout or if the store is gone.
    pub async fn wait_for_state<F>(
        receiver: &mut watch::Receiver<ConsumerState>,
        predicate: F,
    ) -> Option<ConsumerState>
    where
        F: FnMut(&ConsumerState) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(1), receiver.wait_for(predicate))
            .await
            .ok()?
            .ok()
            .map(|state| state.clone())
    }

    /// Initialise a tracing subscriber for tests
    ///
    /// Honours `RUST_LOG`; safe to call more than once.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies for domain types.
pub mod properties {
    use proptest::prelude::*;
    use reqhook_core::{Method, RequestDescriptor};
    use serde_json::json;

    /// Any HTTP method
    pub fn method() -> impl Strategy<Value = Method> {
        prop_oneof![
            Just(Method::Get),
            Just(Method::Post),
            Just(Method::Put),
            Just(Method::Patch),
            Just(Method::Delete),
            Just(Method::Head),
            Just(Method::Options),
        ]
    }

    /// Descriptors with random URL, method, headers, params and body
    pub fn descriptor() -> impl Strategy<Value = RequestDescriptor> {
        (
            "/[a-z0-9/]{0,24}",
            method(),
            proptest::collection::btree_map("[a-z-]{1,8}", "[ -~]{0,12}", 0..3),
            proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..3),
            proptest::option::of(proptest::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..4)),
        )
            .prop_map(|(url, method, headers, params, body)| {
                let mut descriptor = RequestDescriptor::new(method, url);
                descriptor.headers = headers;
                descriptor.params = params;
                descriptor.data = body.map(|fields| json!(fields));
                descriptor
            })
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, MockGate, MockTransport, RecordingDispatch};
