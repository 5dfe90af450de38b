//! # Reqhook Runtime
//!
//! Runtime for reqhook: everything that performs I/O or owns mutable state.
//!
//! ## Core Components
//!
//! - **`RequestHooks`**: an independently configured orchestration instance
//!   (transport, cache, default options, server-render prefetch queue)
//! - **`Consumer`**: one mounted user of a request, re-rendered by the host
//! - **Executor**: runs requests through the transport and reports lifecycle actions
//! - **Coordinator**: per-consumer single-slot cancellation
//! - **`ReqwestTransport`**: the default HTTP transport
//! - **Settings**: configuration loaded from TOML or environment variables
//!
//! Consumers spawn their requests on the ambient Tokio runtime, so render them
//! from inside one. A render outside a runtime computes its state but starts
//! nothing.
//!
//! ## Example
//!
//! ```no_run
//! use reqhook_core::OptionsOverride;
//! use reqhook_runtime::{HooksConfig, ReqwestTransport, RequestHooks};
//!
//! # async fn example() {
//! let hooks = RequestHooks::new(
//!     HooksConfig::new().with_transport(ReqwestTransport::new().with_base_url("https://api.example.com")),
//! );
//!
//! let mut consumer = hooks.consumer();
//! let (state, _refetch, _cancel) = consumer.render("/todos/1", OptionsOverride::none());
//! assert!(state.loading);
//!
//! consumer.settled().await;
//! let state = consumer.state();
//! # }
//! ```

/// Consumer instances and their refetch/cancel handles
pub mod consumer;

/// Per-consumer cancellation coordinator
pub mod coordinator;

/// Request execution with the cache-first policy
pub mod executor;

/// Orchestration instances and their configuration
pub mod hooks;

/// Metrics for observability
pub mod metrics;

/// Configuration loaded from TOML files or environment variables
pub mod settings;

/// Server-render prefetch queue
pub mod ssr;

/// Reducer-driven consumer state store
pub mod store;

/// Default `reqwest` transport
pub mod transport;

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while loading settings
    #[derive(Error, Debug)]
    pub enum SettingsError {
        /// The settings file could not be read
        #[error("Failed to read settings file {path}: {source}")]
        Read {
            /// Path of the file
            path: String,
            /// Underlying I/O error
            #[source]
            source: std::io::Error,
        },

        /// The settings file is not valid TOML for the settings schema
        #[error("Failed to parse settings: {0}")]
        Parse(#[from] toml::de::Error),

        /// An environment variable holds a value of the wrong shape
        #[error("Invalid value for {var}: {value:?}")]
        InvalidEnv {
            /// Variable name
            var: String,
            /// Offending value
            value: String,
        },

        /// Settings parsed but are not usable
        #[error("Settings validation failed: {0}")]
        Validation(String),
    }
}

pub use consumer::{Cancel, Consumer, Refetch};
pub use coordinator::CancellationCoordinator;
pub use error::SettingsError;
pub use executor::{execute_request, request};
pub use hooks::{default_hooks, HooksConfig, RenderMode, RequestHooks};
pub use settings::HooksSettings;
pub use store::StateStore;
pub use transport::ReqwestTransport;
