//! Storage and sync state sum types.
//!
//! `StorageState` is the *logical* lock status of the encrypted store. It is
//! independent of whether the underlying engine handle is currently open:
//! closing the handle on backgrounding does not change it, and the handle is
//! reopened transparently on the next foreground.

use std::fmt;

// =============================================================================
// StorageState
// =============================================================================

/// Logical readiness of the encrypted login store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageState {
    /// No key material exists; the store is not usable.
    Unprepared,
    /// Key material exists but the store is not decrypted.
    Locked,
    /// The store is open and usable.
    Unlocked,
    /// A credential update or unlock failed; a new `UpdateCredentials` or
    /// `Reset` is required to leave this state.
    Errored(String),
}

impl StorageState {
    /// Returns `true` while engine read/write calls are permitted.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprepared => write!(f, "Unprepared"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
            Self::Errored(reason) => write!(f, "Errored({reason})"),
        }
    }
}

// =============================================================================
// SyncState
// =============================================================================

/// Status of the most recent or in-flight synchronization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Synchronization is not possible (no account configured).
    NotSyncable,
    /// A sync is in flight.
    Syncing {
        /// Suppresses the completion notification for this particular sync.
        /// Does not change sync semantics.
        suppress_notification: bool,
    },
    /// The last sync completed successfully (also the initial state).
    Synced,
    /// The last sync failed or timed out.
    TimedOut,
}

impl SyncState {
    /// Returns `true` while a sync is in flight.
    #[must_use]
    pub const fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing { .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSyncable => write!(f, "NotSyncable"),
            Self::Syncing {
                suppress_notification,
            } => write!(f, "Syncing(suppress_notification: {suppress_notification})"),
            Self::Synced => write!(f, "Synced"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_equality_is_structural() {
        assert_eq!(
            SyncState::Syncing {
                suppress_notification: false
            },
            SyncState::Syncing {
                suppress_notification: false
            }
        );
        assert_eq!(
            SyncState::Syncing {
                suppress_notification: true
            },
            SyncState::Syncing {
                suppress_notification: true
            }
        );
        assert_ne!(
            SyncState::Syncing {
                suppress_notification: false
            },
            SyncState::Syncing {
                suppress_notification: true
            }
        );
        assert_eq!(SyncState::Synced, SyncState::Synced);
        assert_ne!(
            SyncState::Synced,
            SyncState::Syncing {
                suppress_notification: false
            }
        );
        assert_eq!(SyncState::TimedOut, SyncState::TimedOut);
    }

    #[test]
    fn test_is_syncing() {
        assert!(!SyncState::Synced.is_syncing());
        assert!(!SyncState::TimedOut.is_syncing());
        assert!(!SyncState::NotSyncable.is_syncing());
        assert!(SyncState::Syncing {
            suppress_notification: true
        }
        .is_syncing());
        assert!(SyncState::Syncing {
            suppress_notification: false
        }
        .is_syncing());
    }

    #[test]
    fn test_storage_state_display() {
        assert_eq!(format!("{}", StorageState::Unprepared), "Unprepared");
        assert_eq!(
            format!("{}", StorageState::Errored("wrong key".to_string())),
            "Errored(wrong key)"
        );
    }

    #[test]
    fn test_storage_state_errored_compares_reason() {
        assert_eq!(
            StorageState::Errored("a".to_string()),
            StorageState::Errored("a".to_string())
        );
        assert_ne!(
            StorageState::Errored("a".to_string()),
            StorageState::Errored("b".to_string())
        );
    }
}
