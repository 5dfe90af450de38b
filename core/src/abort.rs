//! Cancellation handles.
//!
//! An [`AbortController`] owns the right to cancel one request attempt; the
//! [`AbortSignal`] it hands out travels with the descriptor into the transport.
//! Cancellation is cooperative: a transport that ignores the signal keeps
//! running, but the executor still classifies its eventual cancellation error
//! and suppresses the state update.

use std::fmt;
use tokio::sync::watch;

/// Owner side of a cancellation handle
pub struct AbortController {
    sender: watch::Sender<bool>,
    signal: AbortSignal,
}

impl AbortController {
    /// Create a live (not yet aborted) controller
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender,
            signal: AbortSignal { receiver },
        }
    }

    /// A signal observing this controller
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the request this controller guards
    ///
    /// Idempotent. Returns `true` only for the call that actually flipped the
    /// controller into the aborted state.
    pub fn abort(&self) -> bool {
        self.sender.send_if_modified(|aborted| {
            if *aborted {
                false
            } else {
                *aborted = true;
                true
            }
        })
    }

    /// Whether [`abort`](Self::abort) has been called
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortController")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Observer side of a cancellation handle
///
/// Cheap to clone. Two signals compare equal when they observe the same
/// controller.
#[derive(Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Whether the controller has aborted
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the controller aborts
    ///
    /// If the controller is dropped without aborting (it was superseded with
    /// auto-cancel disabled), the request is allowed to finish and this future
    /// never resolves.
    pub async fn aborted(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl PartialEq for AbortSignal {
    fn eq(&self, other: &Self) -> bool {
        self.receiver.same_channel(&other.receiver)
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
