//! Action and lifecycle event types carried on the buses.
//!
//! Actions are immutable values: constructed once by whoever dispatches
//! them and consumed by the data store's single processing sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Sync credentials
// =============================================================================

/// Opaque bundle the storage engine needs to reach the remote sync service.
///
/// Held in memory by the data store for the lifetime of the session and
/// handed to the engine's `sync` operation; never written to logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUnlockInfo {
    /// Key identifier for the sync key.
    pub kid: String,
    /// Access token for the remote account service.
    pub access_token: String,
    /// Key used to decrypt synced payloads.
    pub sync_key: String,
    /// URL of the token server to sync against.
    pub token_server_url: String,
}

impl fmt::Debug for SyncUnlockInfo {
    // Tokens and the sync key must not reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncUnlockInfo")
            .field("kid", &self.kid)
            .field("access_token", &"<redacted>")
            .field("sync_key", &"<redacted>")
            .field("token_server_url", &self.token_server_url)
            .finish()
    }
}

/// Credentials delivered by an `UpdateCredentials` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCredential {
    /// The sync-unlock bundle.
    pub sync_info: SyncUnlockInfo,
    /// When `true`, the key material must be (re)persisted to the secure
    /// key store before use.
    pub is_new: bool,
}

// =============================================================================
// Actions
// =============================================================================

/// External commands consumed by the data store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStoreAction {
    /// Wipe the local store and forget all in-memory records.
    Reset,
    /// Install (and optionally persist) fresh credentials, then unlock.
    UpdateCredentials(SyncCredential),
    /// Lock the store.
    Lock,
    /// Unlock the store with the persisted key.
    Unlock,
    /// Update recency metadata for one record.
    Touch {
        /// Record id to touch.
        id: String,
    },
    /// Begin an opportunistic sync.
    SyncStart,
    /// Delete one record.
    Delete {
        /// Record id to delete.
        id: String,
    },
}

impl DataStoreAction {
    /// Short name for logs and `InvalidTransition` reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::UpdateCredentials(_) => "update_credentials",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Touch { .. } => "touch",
            Self::SyncStart => "sync_start",
            Self::Delete { .. } => "delete",
        }
    }
}

/// OS lifecycle events consumed by the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// The application entered the foreground.
    Foreground,
    /// The application entered the background.
    Background,
    /// The application is shutting down.
    Shutdown,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unlock_info() -> SyncUnlockInfo {
        SyncUnlockInfo {
            kid: "kid-1".to_string(),
            access_token: "token-secret".to_string(),
            sync_key: "sync-key-secret".to_string(),
            token_server_url: "https://token.example.com".to_string(),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", unlock_info());
        assert!(rendered.contains("kid-1"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("token-secret"));
        assert!(!rendered.contains("sync-key-secret"));
    }

    #[test]
    fn test_unlock_info_roundtrips_through_json() {
        let info = unlock_info();
        let json = serde_json::to_string(&info).unwrap();
        let decoded: SyncUnlockInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(DataStoreAction::Reset.name(), "reset");
        assert_eq!(
            DataStoreAction::Touch {
                id: "x".to_string()
            }
            .name(),
            "touch"
        );
    }
}
