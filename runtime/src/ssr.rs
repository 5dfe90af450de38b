//! Server-render prefetch queue.
//!
//! Server renders never commit, so consumers rendered on the server cannot run
//! effects. Instead each such render queues a prefetch that fills the cache.
//! Serializing the cache first drains the queue: the current tasks are taken
//! out of the queue and awaited, while tasks queued during the wait stay for
//! the next drain.

use futures::future::join_all;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Queue of in-flight prefetch tasks
#[derive(Debug, Default)]
pub struct SsrQueue {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SsrQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a spawned prefetch
    pub fn push(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Number of queued prefetches
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the queued prefetches and wait for all of them
    ///
    /// Returns the number of prefetches awaited. A prefetch task that panicked
    /// is logged and otherwise ignored.
    pub async fn drain(&self) -> usize {
        let snapshot = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let count = snapshot.len();

        for result in join_all(snapshot).await {
            if let Err(error) = result {
                tracing::warn!(error = %error, "Prefetch task failed");
            }
        }

        tracing::debug!(count, "Drained prefetch queue");
        count
    }
}
