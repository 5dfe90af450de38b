//! Request execution.
//!
//! [`execute_request`] runs one attempt against the transport and reports its
//! lifecycle through a [`Dispatch`] target. [`request`] adds the cache-first
//! policy on top.
//!
//! Failure handling is asymmetric:
//!
//! - a cancellation dispatches nothing and is returned to the caller
//! - a real failure is dispatched as `End(Err)` and also returned
//!
//! An attempt whose signal fired while the transport was busy is treated as
//! cancelled whatever the transport produced. The final `End` is delivered with
//! [`Dispatch::dispatch_live`], which re-checks the signal atomically with the
//! state write, so a superseded attempt can never overwrite the state of its
//! successor. An aborted attempt never writes the cache.

use crate::metrics::{CacheMetrics, RequestMetrics};
use crate::store::Dispatch;
use reqhook_core::environment::Transport;
use reqhook_core::state::RequestAction;
use reqhook_core::{Cache, Options, RequestDescriptor, RequestError, Response};
use std::time::Instant;

/// Look up `descriptor` in `cache`, recording hit/miss metrics
#[must_use]
pub fn lookup_cached(cache: &Cache, descriptor: &RequestDescriptor) -> Option<Response> {
    if !cache.is_enabled() {
        return None;
    }

    let hit = cache.lookup(descriptor);
    if hit.is_some() {
        tracing::trace!(url = %descriptor.url, "Cache hit");
        CacheMetrics::record_hit();
    } else {
        tracing::trace!(url = %descriptor.url, "Cache miss");
        CacheMetrics::record_miss();
    }
    hit
}

/// Run one attempt against the transport
///
/// Dispatches `Start`, awaits the transport, then:
///
/// - on success writes the stripped response to the cache, dispatches
///   `End(Ok)` and returns the response
/// - on a real failure dispatches `End(Err)` and returns the error
/// - on cancellation returns [`RequestError::Cancelled`] without dispatching
///
/// # Errors
///
/// Returns the transport failure, or `Cancelled` if the descriptor's signal
/// fired.
#[tracing::instrument(
    skip_all,
    name = "execute_request",
    fields(method = %descriptor.method, url = %descriptor.url)
)]
pub async fn execute_request(
    descriptor: RequestDescriptor,
    dispatch: &dyn Dispatch,
    cache: &Cache,
    transport: &dyn Transport,
) -> Result<Response, RequestError> {
    dispatch.dispatch(RequestAction::Start);
    RequestMetrics::record_start();
    tracing::debug!("Dispatching request");

    let started = Instant::now();
    let outcome = transport.execute(descriptor.clone()).await;

    let outcome = match outcome {
        Err(error) if error.is_cancellation() => Err(error),
        _ if descriptor.is_aborted() => Err(RequestError::Cancelled),
        other => other,
    };

    match outcome {
        Ok(response) => {
            let response = response.into_cacheable();
            if descriptor.is_aborted() {
                return Err(superseded());
            }
            if let Some(evicted) = cache.store(&descriptor, response.clone()) {
                tracing::trace!(evicted = %evicted, "Evicted least recently used cache entry");
                CacheMetrics::record_eviction();
            }

            let applied = dispatch.dispatch_live(
                RequestAction::End(Ok(response.clone())),
                descriptor.signal.as_ref(),
            );
            if !applied {
                return Err(superseded());
            }

            RequestMetrics::record_completed(started.elapsed());
            tracing::debug!(status = response.status, "Request completed");
            Ok(response)
        }
        Err(error) if error.is_cancellation() => {
            RequestMetrics::record_cancelled();
            tracing::trace!("Request cancelled");
            Err(error)
        }
        Err(error) => {
            let applied = dispatch.dispatch_live(
                RequestAction::End(Err(error.clone())),
                descriptor.signal.as_ref(),
            );
            if !applied {
                return Err(superseded());
            }

            RequestMetrics::record_failed(error.code(), started.elapsed());
            tracing::debug!(code = error.code(), error = %error, "Request failed");
            Err(error)
        }
    }
}

/// An attempt aborted between the transport returning and its result landing
fn superseded() -> RequestError {
    RequestMetrics::record_cancelled();
    tracing::trace!("Request superseded before its result was applied");
    RequestError::Cancelled
}

/// Serve `descriptor` from the cache when allowed, otherwise execute it
///
/// A cache hit dispatches `End(Ok)` directly (no `Start`) and never calls the
/// transport.
///
/// # Errors
///
/// See [`execute_request`].
pub async fn request(
    descriptor: RequestDescriptor,
    options: &Options,
    dispatch: &dyn Dispatch,
    cache: &Cache,
    transport: &dyn Transport,
) -> Result<Response, RequestError> {
    if options.use_cache {
        if let Some(hit) = lookup_cached(cache, &descriptor) {
            dispatch.dispatch(RequestAction::End(Ok(hit.clone())));
            return Ok(hit);
        }
    }

    execute_request(descriptor, dispatch, cache, transport).await
}
