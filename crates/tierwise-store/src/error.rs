//! Store error types.

use thiserror::Error;

/// Errors raised by the in-process stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A backend refused the operation; raised on purpose by test doubles.
    #[error("store unavailable during {operation}")]
    Unavailable { operation: &'static str },

    /// A writer panicked while holding the store lock.
    #[error("store state is poisoned")]
    Poisoned,
}
