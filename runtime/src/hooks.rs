//! Orchestration instances.
//!
//! A [`RequestHooks`] instance binds a transport, a cache and default options,
//! and owns the prefetch queue used during server renders. Instances are
//! independent; [`default_hooks`] offers a lazily built process-wide one for
//! hosts that want a single shared binding.

use crate::consumer::Consumer;
use crate::ssr::SsrQueue;
use crate::transport::ReqwestTransport;
use once_cell::sync::Lazy;
use reqhook_core::cache::DEFAULT_MAX_ENTRIES;
use reqhook_core::environment::Transport;
use reqhook_core::{Cache, CacheDump, Options, OptionsOverride};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Where consumers are being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Renders commit and run effects
    #[default]
    Interactive,
    /// Renders never commit; eligible consumers queue prefetches instead
    Server,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// Partial configuration applied by [`RequestHooks::new`] and
/// [`RequestHooks::configure`]
///
/// Only the fields that were set replace the current bindings.
///
/// # Example
///
/// ```
/// use reqhook_core::{Cache, OptionsOverride};
/// use reqhook_runtime::{HooksConfig, RequestHooks};
///
/// let hooks = RequestHooks::new(
///     HooksConfig::new()
///         .with_cache(Cache::lru(100))
///         .with_default_options(OptionsOverride::none().manual(true)),
/// );
/// assert!(hooks.default_options().manual);
/// ```
#[derive(Clone, Default)]
#[must_use]
pub struct HooksConfig {
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Cache>,
    default_options: Option<OptionsOverride>,
    render_mode: Option<RenderMode>,
}

impl HooksConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `transport` for every request
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    /// Use an already shared transport
    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `cache` (possibly [`Cache::Disabled`])
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Default options, merged over the built-in defaults
    pub const fn with_default_options(mut self, options: OptionsOverride) -> Self {
        self.default_options = Some(options);
        self
    }

    /// Render mode of the instance
    pub const fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }
}

impl fmt::Debug for HooksConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HooksConfig")
            .field("transport", &self.transport.as_ref().map(|_| "<transport>"))
            .field("cache", &self.cache)
            .field("default_options", &self.default_options)
            .field("render_mode", &self.render_mode)
            .finish()
    }
}

/// The current bindings of an instance
///
/// `generation` changes on every (re)configuration so mounted consumers re-run
/// their effect against the new bindings.
#[derive(Clone)]
pub(crate) struct Bindings {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Cache,
    pub(crate) default_options: Options,
    pub(crate) render_mode: RenderMode,
    pub(crate) generation: u64,
}

impl Bindings {
    fn defaults(generation: u64) -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            cache: Cache::lru(DEFAULT_MAX_ENTRIES),
            default_options: Options::DEFAULT,
            render_mode: RenderMode::Interactive,
            generation,
        }
    }
}

/// State shared by an instance and all of its consumers
pub(crate) struct HooksShared {
    bindings: RwLock<Bindings>,
    pub(crate) ssr: SsrQueue,
}

impl HooksShared {
    pub(crate) fn bindings(&self) -> Bindings {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// An independently configured orchestration instance
///
/// Cloning shares the instance.
///
/// # Example
///
/// ```no_run
/// use reqhook_core::OptionsOverride;
/// use reqhook_runtime::{HooksConfig, ReqwestTransport, RequestHooks};
///
/// # async fn example() {
/// let hooks = RequestHooks::new(
///     HooksConfig::new().with_transport(ReqwestTransport::new().with_base_url("https://api.example.com")),
/// );
///
/// let mut consumer = hooks.consumer();
/// let (state, refetch, _cancel) = consumer.render("/todos/1", OptionsOverride::none());
/// assert!(state.loading);
///
/// let _ = refetch.run().await;
/// # }
/// ```
#[derive(Clone)]
pub struct RequestHooks {
    shared: Arc<HooksShared>,
}

impl RequestHooks {
    /// Create an instance from the built-in defaults overridden by `config`
    #[must_use]
    pub fn new(config: HooksConfig) -> Self {
        let hooks = Self {
            shared: Arc::new(HooksShared {
                bindings: RwLock::new(Bindings::defaults(0)),
                ssr: SsrQueue::new(),
            }),
        };
        hooks.configure(config);
        hooks
    }

    /// Replace the bindings named in `config`
    ///
    /// Default options are merged over the built-in defaults, not over the
    /// previously configured ones.
    pub fn configure(&self, config: HooksConfig) {
        let mut bindings = self
            .shared
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(transport) = config.transport {
            bindings.transport = transport;
        }
        if let Some(cache) = config.cache {
            bindings.cache = cache;
        }
        if let Some(options) = config.default_options {
            bindings.default_options = Options::DEFAULT.merged(&options);
        }
        if let Some(mode) = config.render_mode {
            bindings.render_mode = mode;
        }
        bindings.generation += 1;

        tracing::debug!(
            generation = bindings.generation,
            cache_enabled = bindings.cache.is_enabled(),
            render_mode = %bindings.render_mode,
            "Configured request hooks"
        );
    }

    /// Restore the default transport, a fresh default cache and the built-in
    /// default options
    ///
    /// The render mode goes back to interactive.
    pub fn reset_configure(&self) {
        let mut bindings = self
            .shared
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = bindings.generation + 1;
        *bindings = Bindings::defaults(generation);

        tracing::debug!(generation, "Reset request hooks configuration");
    }

    /// Mount a new consumer
    #[must_use]
    pub fn consumer(&self) -> Consumer {
        Consumer::new(Arc::clone(&self.shared))
    }

    /// Merge a dump (usually produced by a server render) into the cache
    pub fn load_cache(&self, dump: CacheDump) {
        let count = dump.len();
        self.shared.bindings().cache.load(dump);
        tracing::debug!(count, "Loaded cache dump");
    }

    /// Wait for queued prefetches, then dump the cache
    ///
    /// Only the prefetches queued when the call starts are awaited; the queue
    /// is empty right after they finish unless new ones were queued meanwhile.
    /// A disabled cache yields an empty dump.
    pub async fn serialize_cache(&self) -> CacheDump {
        self.shared.ssr.drain().await;
        let dump = self.shared.bindings().cache.dump();
        tracing::debug!(count = dump.len(), "Serialized cache");
        dump
    }

    /// Remove every cached entry
    pub fn clear_cache(&self) {
        self.shared.bindings().cache.clear();
    }

    /// Number of prefetches waiting to be drained
    #[must_use]
    pub fn ssr_pending(&self) -> usize {
        self.shared.ssr.len()
    }

    /// The bound cache
    #[must_use]
    pub fn cache(&self) -> Cache {
        self.shared.bindings().cache
    }

    /// The configured default options
    #[must_use]
    pub fn default_options(&self) -> Options {
        self.shared.bindings().default_options
    }

    /// The configured render mode
    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.shared.bindings().render_mode
    }
}

impl Default for RequestHooks {
    fn default() -> Self {
        Self::new(HooksConfig::default())
    }
}

impl fmt::Debug for RequestHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.shared.bindings();
        f.debug_struct("RequestHooks")
            .field("cache", &bindings.cache)
            .field("default_options", &bindings.default_options)
            .field("render_mode", &bindings.render_mode)
            .field("ssr_pending", &self.shared.ssr.len())
            .finish_non_exhaustive()
    }
}

static DEFAULT_HOOKS: Lazy<RequestHooks> = Lazy::new(RequestHooks::default);

/// The process-wide default instance, built on first use
#[must_use]
pub fn default_hooks() -> &'static RequestHooks {
    &DEFAULT_HOOKS
}
