//! # Reqhook Core
//!
//! Core types and pure functions for reqhook, a request-state manager that wraps
//! a single HTTP call with observable lifecycle state.
//!
//! This crate holds everything that can be expressed without performing I/O:
//!
//! - **Descriptor**: the normalized request (`RequestDescriptor`) and its inputs
//! - **Options**: per-consumer behavior switches (`manual`, `use_cache`, `ssr`, `auto_cancel`)
//! - **Fingerprint**: deterministic cache keys derived from descriptors
//! - **Cache**: a bounded least-recently-used response store with dump/load
//! - **State**: the lifecycle reducer and the initial-state resolver
//! - **Abort**: the cancellation handle pair attached to in-flight requests
//! - **Memo**: structural-equality memoization tokens that drive effect re-runs
//! - **Environment**: the `Transport` trait the runtime injects
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow (actions → reducer → state)
//! - Dependency Injection via the `Transport` environment trait
//!
//! ## Example
//!
//! ```
//! use reqhook_core::reducer::Reducer;
//! use reqhook_core::state::{ConsumerState, RequestAction, RequestReducer};
//!
//! let mut state = ConsumerState::idle();
//! let changed = RequestReducer.reduce(&mut state, RequestAction::Start);
//!
//! assert!(changed);
//! assert!(state.loading);
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use serde_json::Value;

/// Abort controller and signal used to cancel in-flight requests
pub mod abort;

/// Bounded response cache with least-recently-used eviction
pub mod cache;

/// Request descriptors and the inputs they are normalized from
pub mod descriptor;

/// Error types shared by transports, the executor and consumer state
pub mod error;

/// Deterministic cache keys
pub mod fingerprint;

/// Structural-equality memoization tokens
pub mod memo;

/// Consumer options and their defaults
pub mod options;

/// Transport responses
pub mod response;

/// Consumer state, lifecycle actions and the request reducer
pub mod state;

/// Reducer module - the core trait for state transitions
///
/// Reducers are pure functions: `(State, Action) → State`.
///
/// They contain all transition logic and are deterministic and testable.
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```
    /// use reqhook_core::reducer::Reducer;
    ///
    /// struct Counter;
    ///
    /// impl Reducer for Counter {
    ///     type State = i32;
    ///     type Action = i32;
    ///
    ///     fn reduce(&self, state: &mut i32, action: i32) -> bool {
    ///         *state += action;
    ///         action != 0
    ///     }
    /// }
    ///
    /// let mut value = 1;
    /// assert!(Counter.reduce(&mut value, 2));
    /// assert_eq!(value, 3);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Fold an action into the state in place
        ///
        /// Returns `true` when the state changed. Stores use this to avoid
        /// notifying subscribers about transitions that left the state as it was.
        fn reduce(&self, state: &mut Self::State, action: Self::Action) -> bool;
    }
}

/// Environment module - dependency injection traits
///
/// All I/O the engine performs goes through traits injected by the runtime,
/// so the core stays testable with in-memory implementations.
pub mod environment {
    use crate::descriptor::RequestDescriptor;
    use crate::error::RequestError;
    use crate::response::Response;
    use chrono::{DateTime, Utc};
    use std::future::Future;
    use std::pin::Pin;

    /// Clock trait - abstracts time operations for testability
    ///
    /// The cache stamps entries with the time they were stored.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Boxed future returned by [`Transport::execute`]
    pub type TransportFuture<'a> =
        Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'a>>;

    /// Transport trait - performs one HTTP exchange for a descriptor
    ///
    /// Implementations must honour the descriptor's abort signal: once it fires,
    /// the returned future should resolve to [`RequestError::Cancelled`] so the
    /// executor can suppress the result.
    ///
    /// # Dyn Compatibility
    ///
    /// This trait returns `Pin<Box<dyn Future>>` instead of using `async fn`
    /// so it can be stored as `Arc<dyn Transport>` and swapped at runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use reqhook_core::descriptor::RequestDescriptor;
    /// use reqhook_core::environment::{Transport, TransportFuture};
    /// use reqhook_core::response::Response;
    ///
    /// struct Echo;
    ///
    /// impl Transport for Echo {
    ///     fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_> {
    ///         Box::pin(async move { Ok(Response::ok(serde_json::json!(request.url))) })
    ///     }
    /// }
    /// ```
    pub trait Transport: Send + Sync {
        /// Execute the request described by `request`
        fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_>;
    }
}

pub use cache::{Cache, CacheDump, CacheRecord, CacheStore, LruCache};
pub use environment::{Clock, SystemClock, Transport};
pub use descriptor::{DescriptorInput, DescriptorOverride, Method, RefetchArgument, RequestDescriptor};
pub use error::{RequestError, TransportErrorKind};
pub use fingerprint::{fingerprint, Fingerprint};
pub use options::{Options, OptionsOverride};
pub use response::Response;
pub use state::{create_initial_state, ConsumerState, Discard, Dispatch, RequestAction, RequestReducer};
