//! Error types for the data-store state machine.

use thiserror::Error;

use crate::state::StorageState;

/// Result type for data-store operations.
pub type DataStoreResult<T> = Result<T, DataStoreError>;

/// Errors raised while driving the encrypted login store.
#[derive(Debug, Error)]
pub enum DataStoreError {
    /// Key material is missing from the key store or unusable.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// The underlying storage engine failed.
    #[error("engine i/o error: {0}")]
    EngineIo(String),

    /// A remote synchronization attempt failed or timed out.
    #[error("sync failure: {0}")]
    SyncFailure(String),

    /// An action arrived in a state that cannot service it.
    ///
    /// Treated as a no-op by the state machine; surfaced so callers can
    /// tell that nothing happened.
    #[error("invalid transition: {action} while {state}")]
    InvalidTransition {
        /// The action that was refused.
        action: &'static str,
        /// The storage state at the time the action arrived.
        state: StorageState,
    },
}

impl DataStoreError {
    /// Creates a key-material error.
    pub fn key_material<S: Into<String>>(message: S) -> Self {
        Self::KeyMaterial(message.into())
    }

    /// Creates an engine I/O error.
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::EngineIo(message.into())
    }

    /// Creates a sync failure.
    pub fn sync<S: Into<String>>(message: S) -> Self {
        Self::SyncFailure(message.into())
    }

    /// Returns `true` for failures that must not alter global state
    /// (reported to the caller, logged, and absorbed).
    #[must_use]
    pub const fn is_non_fatal(&self) -> bool {
        matches!(self, Self::SyncFailure(_) | Self::InvalidTransition { .. })
    }
}
