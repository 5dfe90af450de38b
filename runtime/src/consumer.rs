//! Consumer instances.
//!
//! A [`Consumer`] is one mounted user of a request: it keeps the persistent
//! per-instance slots (memoized inputs, the state store, the cancellation
//! coordinator, the last effect) and is re-rendered by the host with fresh
//! inputs. Each render returns the current state together with [`Refetch`] and
//! [`Cancel`] handles.
//!
//! The automatic request is an effect keyed on three identities: the memoized
//! descriptor, the memoized options and the bindings generation. It re-runs
//! only when one of them changes; the previous run is cleaned up first, which
//! aborts its request when auto-cancel is on.

use crate::coordinator::CancellationCoordinator;
use crate::executor::{lookup_cached, request};
use crate::hooks::{Bindings, HooksShared, RenderMode};
use crate::metrics::SsrMetrics;
use crate::store::StateStore;
use reqhook_core::environment::Transport;
use reqhook_core::memo::{Memo, MemoToken};
use reqhook_core::state::{create_initial_state, ConsumerState, Discard, RequestReducer};
use reqhook_core::{
    Cache, DescriptorInput, Options, OptionsOverride, RefetchArgument, RequestDescriptor,
    RequestError, Response,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EffectDeps {
    descriptor: MemoToken,
    options: MemoToken,
    generation: u64,
}

struct EffectRun {
    deps: EffectDeps,
    auto_cancel: bool,
    task: Option<JoinHandle<()>>,
}

/// One mounted consumer
///
/// Dropping the consumer unmounts it: with auto-cancel on, the outstanding
/// request is aborted and its result never reaches the state.
pub struct Consumer {
    shared: Arc<HooksShared>,
    coordinator: Arc<CancellationCoordinator>,
    descriptor: Memo<RequestDescriptor>,
    options: Memo<Options>,
    store: Option<StateStore<RequestReducer>>,
    effect: Option<EffectRun>,
}

impl Consumer {
    pub(crate) fn new(shared: Arc<HooksShared>) -> Self {
        Self {
            shared,
            coordinator: Arc::new(CancellationCoordinator::new()),
            descriptor: Memo::new(),
            options: Memo::new(),
            store: None,
            effect: None,
        }
    }

    /// Render with the given request and options
    ///
    /// The first render computes the initial state (from the cache when
    /// allowed). In interactive mode a non-manual consumer then dispatches its
    /// request in the background; in server mode an eligible consumer queues a
    /// prefetch instead.
    ///
    /// Requests and prefetches are spawned on the current Tokio runtime. Outside
    /// a runtime nothing is spawned and a warning is logged; the returned state
    /// is still computed.
    pub fn render(
        &mut self,
        input: impl Into<DescriptorInput>,
        options: impl Into<OptionsOverride>,
    ) -> (ConsumerState, Refetch, Cancel) {
        let bindings = self.shared.bindings();

        let (descriptor, descriptor_token) = {
            let (value, token) = self.descriptor.update(input.into().into_descriptor());
            (value.clone(), token)
        };
        let (options, options_token) = {
            let merged = bindings.default_options.merged(&options.into());
            let (value, token) = self.options.update(merged);
            (*value, token)
        };

        if bindings.render_mode == RenderMode::Server && options.ssr && !options.manual {
            self.queue_prefetch(&bindings, &descriptor, options);
        }

        let store = self
            .store
            .get_or_insert_with(|| {
                let initial = create_initial_state(&descriptor, &options, |d| {
                    lookup_cached(&bindings.cache, d)
                });
                StateStore::new(initial, RequestReducer)
            })
            .clone();
        let state = store.snapshot();

        if bindings.render_mode == RenderMode::Interactive {
            let deps = EffectDeps {
                descriptor: descriptor_token,
                options: options_token,
                generation: bindings.generation,
            };
            self.run_effect(deps, &bindings, &store, &descriptor, options);
        }

        let refetch = Refetch {
            inner: Arc::new(RefetchInner {
                base: descriptor,
                options,
                store,
                coordinator: Arc::clone(&self.coordinator),
                cache: bindings.cache.clone(),
                transport: Arc::clone(&bindings.transport),
            }),
        };
        let cancel = Cancel {
            coordinator: Arc::clone(&self.coordinator),
        };

        (state, refetch, cancel)
    }

    fn run_effect(
        &mut self,
        deps: EffectDeps,
        bindings: &Bindings,
        store: &StateStore<RequestReducer>,
        descriptor: &RequestDescriptor,
        options: Options,
    ) {
        if self.effect.as_ref().is_some_and(|run| run.deps == deps) {
            return;
        }
        self.cleanup_effect();

        let task = if options.manual {
            None
        } else {
            let descriptor = self.coordinator.mint(descriptor.clone(), options.auto_cancel);
            let store = store.clone();
            let cache = bindings.cache.clone();
            let transport = Arc::clone(&bindings.transport);

            spawn_on_current(async move {
                match request(descriptor, &options, &store, &cache, transport.as_ref()).await {
                    Err(error) if !error.is_cancellation() => {
                        tracing::warn!(code = error.code(), error = %error, "Automatic request failed");
                    }
                    _ => {}
                }
            })
        };

        self.effect = Some(EffectRun {
            deps,
            auto_cancel: options.auto_cancel,
            task,
        });
    }

    fn cleanup_effect(&mut self) {
        if let Some(run) = self.effect.take() {
            if run.auto_cancel {
                self.coordinator.abort();
            }
        }
    }

    fn queue_prefetch(&self, bindings: &Bindings, descriptor: &RequestDescriptor, options: Options) {
        let descriptor = descriptor.clone();
        let cache = bindings.cache.clone();
        let transport = Arc::clone(&bindings.transport);

        tracing::debug!(url = %descriptor.url, "Queueing server prefetch");
        let task = spawn_on_current(async move {
            match request(descriptor, &options, &Discard, &cache, transport.as_ref()).await {
                Err(error) if !error.is_cancellation() => {
                    tracing::warn!(code = error.code(), error = %error, "Server prefetch failed");
                }
                _ => {}
            }
        });

        if let Some(task) = task {
            self.shared.ssr.push(task);
            SsrMetrics::record_prefetch();
        }
    }

    /// Current state, once the consumer has rendered
    #[must_use]
    pub fn state(&self) -> Option<ConsumerState> {
        self.store.as_ref().map(StateStore::snapshot)
    }

    /// Subscribe to state changes, once the consumer has rendered
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<ConsumerState>> {
        self.store.as_ref().map(StateStore::subscribe)
    }

    /// Wait for the automatic request started by the last effect run
    ///
    /// Returns immediately if no automatic request is running.
    pub async fn settled(&mut self) {
        let task = self.effect.as_mut().and_then(|run| run.task.take());
        if let Some(task) = task {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "Automatic request task failed");
            }
        }
    }

    /// Unmount the consumer
    pub fn unmount(self) {
        drop(self);
    }
}

fn spawn_on_current<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(error) => {
            tracing::warn!(error = %error, "No Tokio runtime, request not started");
            None
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.cleanup_effect();
        if self.options.get().is_some_and(|options| options.auto_cancel) {
            self.coordinator.abort();
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("descriptor", &self.descriptor.get())
            .field("options", &self.options.get())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct RefetchInner {
    base: RequestDescriptor,
    options: Options,
    store: StateStore<RequestReducer>,
    coordinator: Arc<CancellationCoordinator>,
    cache: Cache,
    transport: Arc<dyn Transport>,
}

/// Re-issues the consumer's request on demand
///
/// Cloning is cheap. Unlike the automatic request, a refetch skips the cache
/// read unless `use_cache` is explicitly requested; the fresh result is still
/// written to the cache.
#[derive(Clone)]
pub struct Refetch {
    inner: Arc<RefetchInner>,
}

impl Refetch {
    /// Refetch with an optional descriptor override and option overrides
    ///
    /// A new attempt is minted even when the cache answers, so a concurrent
    /// request of the same consumer is aborted (with auto-cancel on).
    ///
    /// # Errors
    ///
    /// Returns the transport failure (also stored in the consumer state), or
    /// [`RequestError::Cancelled`] if this attempt was superseded or cancelled.
    pub async fn call(
        &self,
        argument: impl Into<RefetchArgument>,
        options: OptionsOverride,
    ) -> Result<Response, RequestError> {
        let inner = &*self.inner;
        let options = Options {
            use_cache: false,
            ..inner.options
        }
        .merged(&options);

        let descriptor = argument.into().resolve(&inner.base);
        let descriptor = inner.coordinator.mint(descriptor, options.auto_cancel);
        tracing::debug!(url = %descriptor.url, use_cache = options.use_cache, "Refetching");

        request(
            descriptor,
            &options,
            &inner.store,
            &inner.cache,
            inner.transport.as_ref(),
        )
        .await
    }

    /// Refetch the current descriptor
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn run(&self) -> Result<Response, RequestError> {
        self.call(RefetchArgument::None, OptionsOverride::none()).await
    }

    /// The descriptor a plain refetch requests
    #[must_use]
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.inner.base
    }
}

impl fmt::Debug for Refetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refetch")
            .field("base", &self.inner.base)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

/// Aborts the consumer's outstanding request
#[derive(Debug, Clone)]
pub struct Cancel {
    coordinator: Arc<CancellationCoordinator>,
}

impl Cancel {
    /// Abort the current attempt
    ///
    /// Returns `true` if an outstanding attempt was aborted by this call.
    pub fn cancel(&self) -> bool {
        self.coordinator.abort()
    }
}
