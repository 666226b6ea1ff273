//! Collaborator interfaces the data store depends on.
//!
//! Each external system is a narrow trait injected at construction. Test
//! doubles are ordinary implementations of these traits (see [`memory`]);
//! nothing substitutes behavior by subclassing.

pub mod memory;

use secrecy::SecretString;

use crate::{action::SyncUnlockInfo, error::DataStoreResult, record::LoginRecord};

// =============================================================================
// Key store identifiers
// =============================================================================

/// Key-store identifier for the store's symmetric encryption key.
pub const STORE_KEY_ID: &str = "lockstore.key.logins.db";

// =============================================================================
// Encrypted login store (the engine)
// =============================================================================

/// Opaque encrypted storage engine over a single logical database.
///
/// The data store is the only component allowed to call these operations,
/// and it calls them from one serial processing sequence. Implementations
/// use interior mutability; every operation may fail.
pub trait LoginStore: Send + Sync {
    /// Opens (or re-opens) the underlying database handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be opened.
    fn open(&self) -> DataStoreResult<()>;

    /// Closes the underlying handle. Best effort: implementations absorb
    /// and log their own I/O errors. Closing does not change the logical
    /// lock status.
    fn close(&self);

    /// Reports whether the store is currently locked.
    fn is_locked(&self) -> bool;

    /// Decrypts the store with `key`, a no-op when already unlocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is wrong or the store is unreadable.
    fn ensure_unlocked(&self, key: &SecretString) -> DataStoreResult<()>;

    /// Locks the store, a no-op when already locked.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot flush and lock.
    fn ensure_locked(&self) -> DataStoreResult<()>;

    /// Synchronizes with the remote service. Blocking; the data store runs
    /// it off the processing sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails or times out.
    fn sync(&self, unlock_info: &SyncUnlockInfo) -> DataStoreResult<()>;

    /// Erases the local database.
    ///
    /// # Errors
    ///
    /// Returns an error if the wipe fails.
    fn wipe_local(&self) -> DataStoreResult<()>;

    /// Fetches one record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is locked or unreadable.
    fn get(&self, id: &str) -> DataStoreResult<Option<LoginRecord>>;

    /// Updates recency metadata for one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn touch(&self, id: &str) -> DataStoreResult<()>;

    /// Lists all records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is locked or unreadable.
    fn list(&self) -> DataStoreResult<Vec<LoginRecord>>;

    /// Deletes one record. Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be applied.
    fn delete(&self, id: &str) -> DataStoreResult<bool>;
}

// =============================================================================
// Secure key store
// =============================================================================

/// Persistent secure storage for key material, keyed by string identifiers.
pub trait KeyStore: Send + Sync {
    /// Stores `value` under `key`. Returns `false` if the backing store
    /// refused the write.
    fn set(&self, key: &str, value: SecretString) -> bool;

    /// Reports whether a value exists under `key`.
    fn has_value(&self, key: &str) -> bool;

    /// Retrieves the value stored under `key`.
    fn get(&self, key: &str) -> Option<SecretString>;
}

// =============================================================================
// Autolock policy
// =============================================================================

/// Policy deciding when the store must be treated as lock-required.
pub trait AutolockPolicy: Send + Sync {
    /// Reports whether the store should be locked right now.
    fn lock_currently_required(&self) -> bool;

    /// Records the lock deadline when the app leaves the foreground.
    fn store_next_autolock_time(&self);

    /// Pushes the deadline forward (on explicit unlock).
    fn forward_date_next_lock_time(&self);

    /// Pulls the deadline back so the next check requires a lock
    /// (on explicit lock).
    fn back_date_next_lock_time(&self);
}

// =============================================================================
// Network reachability
// =============================================================================

/// Current network connectivity signal.
pub trait NetworkReachability: Send + Sync {
    /// Reports whether the device currently has connectivity.
    fn is_connected(&self) -> bool;
}
