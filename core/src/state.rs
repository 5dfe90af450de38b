//! Consumer state and its lifecycle.
//!
//! State only changes through [`RequestReducer`]:
//!
//! - `Start` enters a request: `loading` goes up and any stale error is cleared
//! - `End(Ok)` settles with data and response
//! - `End(Err)` settles with the error and drops data and response

use crate::abort::AbortSignal;
use crate::descriptor::RequestDescriptor;
use crate::error::RequestError;
use crate::options::Options;
use crate::reducer::Reducer;
use crate::response::Response;
use serde_json::Value;

/// What a consumer observes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerState {
    /// A request is in flight
    pub loading: bool,

    /// Body of the last successful response
    pub data: Option<Value>,

    /// Error of the last failed attempt
    pub error: Option<RequestError>,

    /// The last successful response
    pub response: Option<Response>,
}

impl ConsumerState {
    /// Nothing requested yet
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            loading: false,
            data: None,
            error: None,
            response: None,
        }
    }

    /// A request is about to be dispatched
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            loading: true,
            data: None,
            error: None,
            response: None,
        }
    }

    /// Settled from a successful (possibly cached) response
    #[must_use]
    pub fn from_response(response: Response) -> Self {
        Self {
            loading: false,
            data: Some(response.data.clone()),
            error: None,
            response: Some(response),
        }
    }

    /// Settled from a failed attempt
    #[must_use]
    pub const fn from_error(error: RequestError) -> Self {
        Self {
            loading: false,
            data: None,
            error: Some(error),
            response: None,
        }
    }
}

/// Lifecycle transitions
#[derive(Debug, Clone, PartialEq)]
pub enum RequestAction {
    /// A request is being dispatched
    Start,
    /// A request finished with a response or a real (non-cancellation) failure
    End(Result<Response, RequestError>),
}

/// Sink for lifecycle actions
///
/// The executor reports progress through this trait rather than touching a
/// store directly, so it can run against a consumer's store or against nothing
/// at all (server prefetches).
pub trait Dispatch: Send + Sync {
    /// Deliver an action
    fn dispatch(&self, action: RequestAction);

    /// Deliver an action unless `signal` has fired
    ///
    /// Returns `false` if the action was dropped. Implementations that guard
    /// their state with a lock check the signal while holding it, so an attempt
    /// aborted by a newer one can never write after it.
    fn dispatch_live(&self, action: RequestAction, signal: Option<&AbortSignal>) -> bool {
        if signal.is_some_and(AbortSignal::is_aborted) {
            return false;
        }
        self.dispatch(action);
        true
    }
}

/// Dispatch target that drops every action
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Dispatch for Discard {
    fn dispatch(&self, _action: RequestAction) {}
}

/// The lifecycle reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestReducer;

impl Reducer for RequestReducer {
    type State = ConsumerState;
    type Action = RequestAction;

    fn reduce(&self, state: &mut ConsumerState, action: RequestAction) -> bool {
        let next = match action {
            RequestAction::Start => ConsumerState {
                loading: true,
                error: None,
                ..state.clone()
            },
            RequestAction::End(Ok(response)) => ConsumerState::from_response(response.into_cacheable()),
            RequestAction::End(Err(error)) => ConsumerState::from_error(error),
        };

        if *state == next {
            return false;
        }
        *state = next;
        true
    }
}

/// Compute the state a consumer starts with
///
/// Manual consumers start idle and never look at the cache. Automatic consumers
/// start settled on a cache hit (when `use_cache` allows a lookup) and loading
/// otherwise, since a request is about to be dispatched.
///
/// `lookup` is only invoked when a cache read is allowed.
pub fn create_initial_state<F>(descriptor: &RequestDescriptor, options: &Options, lookup: F) -> ConsumerState
where
    F: FnOnce(&RequestDescriptor) -> Option<Response>,
{
    if options.manual {
        return ConsumerState::idle();
    }

    let cached = if options.use_cache {
        lookup(descriptor)
    } else {
        None
    };

    cached.map_or_else(ConsumerState::loading, ConsumerState::from_response)
}
