//! Consumer state store.
//!
//! A [`StateStore`] owns one consumer's state and folds actions into it with a
//! [`Reducer`]. State lives in a `watch` channel, so hosts can subscribe and
//! re-render when it changes. Transitions that leave the state unchanged are not
//! published.

use reqhook_core::abort::AbortSignal;
use reqhook_core::reducer::Reducer;
use reqhook_core::state::RequestAction;
use std::sync::Arc;
use tokio::sync::watch;

pub use reqhook_core::state::{Discard, Dispatch};

/// Reducer-driven state container
///
/// Cloning is cheap; clones share the same state.
pub struct StateStore<R: Reducer> {
    reducer: R,
    sender: Arc<watch::Sender<R::State>>,
}

impl<R: Reducer + Clone> Clone for StateStore<R> {
    fn clone(&self) -> Self {
        Self {
            reducer: self.reducer.clone(),
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<R> StateStore<R>
where
    R: Reducer,
    R::State: Clone,
{
    /// Create a store holding `initial`
    #[must_use]
    pub fn new(initial: R::State, reducer: R) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            reducer,
            sender: Arc::new(sender),
        }
    }

    /// Fold `action` into the state
    ///
    /// Returns `true` when the state changed and subscribers were notified.
    pub fn send(&self, action: R::Action) -> bool {
        self.sender
            .send_if_modified(|state| self.reducer.reduce(state, action))
    }

    /// Read from the current state
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&R::State) -> T,
    {
        f(&self.sender.borrow())
    }

    /// Clone the current state
    #[must_use]
    pub fn snapshot(&self) -> R::State {
        self.sender.borrow().clone()
    }

    /// Subscribe to state changes
    ///
    /// The receiver starts with the current state marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.sender.subscribe()
    }
}

impl<R> Dispatch for StateStore<R>
where
    R: Reducer<Action = RequestAction> + Send + Sync,
    R::State: Clone + Send + Sync,
{
    fn dispatch(&self, action: RequestAction) {
        let changed = self.send(action);
        tracing::trace!(changed, "Dispatched lifecycle action");
    }

    fn dispatch_live(&self, action: RequestAction, signal: Option<&AbortSignal>) -> bool {
        let mut live = true;
        let changed = self.sender.send_if_modified(|state| {
            if signal.is_some_and(AbortSignal::is_aborted) {
                live = false;
                return false;
            }
            self.reducer.reduce(state, action)
        });
        tracing::trace!(changed, live, "Dispatched lifecycle action");
        live
    }
}
