//! Per-consumer cancellation.
//!
//! Each consumer owns one [`CancellationCoordinator`]: a single slot that is
//! either idle or holds the controller of the latest attempt. Minting a new
//! attempt aborts the previous one first (when auto-cancel is on), so at most
//! one attempt per consumer can still apply its result.

use reqhook_core::abort::{AbortController, AbortSignal};
use reqhook_core::RequestDescriptor;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Active(AbortController),
}

/// Single-slot cancellation state machine
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    slot: Mutex<Slot>,
}

impl CancellationCoordinator {
    /// Create an idle coordinator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new attempt for `descriptor`
    ///
    /// When `auto_cancel` is set the current attempt (if any) is aborted first.
    /// A fresh controller then becomes current and its signal is attached to
    /// the returned descriptor.
    #[must_use]
    pub fn mint(&self, descriptor: RequestDescriptor, auto_cancel: bool) -> RequestDescriptor {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if auto_cancel {
            if let Slot::Active(previous) = &*slot {
                if previous.abort() {
                    tracing::trace!("Aborted superseded request");
                }
            }
        }

        let controller = AbortController::new();
        let signal = controller.signal();
        *slot = Slot::Active(controller);

        descriptor.with_signal(signal)
    }

    /// Abort the current attempt, if any
    ///
    /// The controller stays in the slot; the next mint replaces it. Returns
    /// `true` if this call fired the abort.
    pub fn abort(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Idle => false,
            Slot::Active(controller) => controller.abort(),
        }
    }

    /// Whether an attempt has been minted
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            *self.slot.lock().unwrap_or_else(PoisonError::into_inner),
            Slot::Active(_)
        )
    }

    /// Signal of the current attempt
    #[must_use]
    pub fn current_signal(&self) -> Option<AbortSignal> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Idle => None,
            Slot::Active(controller) => Some(controller.signal()),
        }
    }
}
