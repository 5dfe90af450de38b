//! Structural-equality memoization.
//!
//! Consumers are re-rendered with freshly built inputs that are usually equal
//! to the previous ones. [`memoize`] keeps the previous value and its token when
//! the new value is structurally equal, and mints a new token otherwise. Effects
//! re-run exactly when one of the tokens they depend on changes.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a memoized value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoToken(u64);

impl MemoToken {
    /// Mint a token distinct from every token minted before
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Memoize `value` against the previously stored value and token
///
/// Returns the value to store and its token. The previous token is reused when
/// `value` equals the previous value; otherwise a fresh token is minted.
///
/// # Example
///
/// ```
/// use reqhook_core::memo::memoize;
///
/// let (first, token) = memoize(vec![1, 2], None);
/// let (_, same) = memoize(vec![1, 2], Some((first, token)));
/// assert_eq!(token, same);
/// ```
#[must_use]
pub fn memoize<T: PartialEq>(value: T, previous: Option<(T, MemoToken)>) -> (T, MemoToken) {
    match previous {
        Some((stored, token)) if stored == value => (stored, token),
        _ => (value, MemoToken::fresh()),
    }
}

/// A persistent memoization slot
#[derive(Debug, Clone, Default)]
pub struct Memo<T> {
    slot: Option<(T, MemoToken)>,
}

impl<T: PartialEq> Memo<T> {
    /// An empty slot
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Store `value` and return the memoized value with its token
    pub fn update(&mut self, value: T) -> (&T, MemoToken) {
        let (stored, token) = memoize(value, self.slot.take());
        let (stored, token) = self.slot.insert((stored, token));
        (stored, *token)
    }

    /// The currently stored value
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.slot.as_ref().map(|(value, _)| value)
    }

    /// The currently stored token
    #[must_use]
    pub fn token(&self) -> Option<MemoToken> {
        self.slot.as_ref().map(|(_, token)| *token)
    }
}
