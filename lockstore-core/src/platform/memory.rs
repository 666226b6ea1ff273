//! In-memory implementations of the collaborator traits.
//!
//! These implementations are NOT secure for production use. They exist for
//! unit and integration testing of the data store, and for embedding hosts
//! that need a throwaway backend. Each one records its invocations so tests
//! can assert on exactly which engine calls a transition produced.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};

use crate::{
    action::SyncUnlockInfo,
    error::{DataStoreError, DataStoreResult},
    record::LoginRecord,
};

use super::{AutolockPolicy, KeyStore, LoginStore, NetworkReachability};

// =============================================================================
// Memory Login Store
// =============================================================================

#[derive(Default)]
struct LoginStoreInner {
    records: Vec<LoginRecord>,
    locked: bool,
    open: bool,
    open_count: u32,
    close_count: u32,
    ensure_unlocked_count: u32,
    ensure_locked_count: u32,
    sync_count: u32,
    wipe_count: u32,
    last_unlock_key: Option<String>,
    last_sync_info: Option<SyncUnlockInfo>,
    touched_ids: Vec<String>,
    deleted_ids: Vec<String>,
    unlock_failure: Option<String>,
    sync_failure: Option<String>,
    touch_failure: Option<String>,
    delete_failure: Option<String>,
    list_failure: Option<String>,
    wipe_failure: Option<String>,
}

/// In-memory [`LoginStore`] with invocation counters and failure toggles.
#[derive(Default)]
pub struct MemoryLoginStore {
    inner: Mutex<LoginStoreInner>,
}

impl MemoryLoginStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the record set the engine will report from `list`/`get`.
    pub fn set_records(&self, records: Vec<LoginRecord>) {
        self.inner.lock().unwrap().records = records;
    }

    /// Arms a failure for the next and subsequent `ensure_unlocked` calls.
    pub fn set_unlock_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().unlock_failure = message.map(str::to_string);
    }

    /// Arms a failure for `sync` calls.
    pub fn set_sync_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().sync_failure = message.map(str::to_string);
    }

    /// Arms a failure for `touch` calls.
    pub fn set_touch_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().touch_failure = message.map(str::to_string);
    }

    /// Arms a failure for `delete` calls.
    pub fn set_delete_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().delete_failure = message.map(str::to_string);
    }

    /// Arms a failure for `list` calls.
    pub fn set_list_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().list_failure = message.map(str::to_string);
    }

    /// Arms a failure for `wipe_local` calls.
    pub fn set_wipe_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().wipe_failure = message.map(str::to_string);
    }

    /// Number of `open` calls so far.
    #[must_use]
    pub fn open_count(&self) -> u32 {
        self.inner.lock().unwrap().open_count
    }

    /// Number of `close` calls so far.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.inner.lock().unwrap().close_count
    }

    /// Number of `ensure_unlocked` calls so far.
    #[must_use]
    pub fn ensure_unlocked_count(&self) -> u32 {
        self.inner.lock().unwrap().ensure_unlocked_count
    }

    /// Number of `ensure_locked` calls so far.
    #[must_use]
    pub fn ensure_locked_count(&self) -> u32 {
        self.inner.lock().unwrap().ensure_locked_count
    }

    /// Number of `sync` calls so far.
    #[must_use]
    pub fn sync_count(&self) -> u32 {
        self.inner.lock().unwrap().sync_count
    }

    /// Number of `wipe_local` calls so far.
    #[must_use]
    pub fn wipe_count(&self) -> u32 {
        self.inner.lock().unwrap().wipe_count
    }

    /// The key passed to the most recent `ensure_unlocked` call.
    #[must_use]
    pub fn last_unlock_key(&self) -> Option<String> {
        self.inner.lock().unwrap().last_unlock_key.clone()
    }

    /// The bundle passed to the most recent `sync` call.
    #[must_use]
    pub fn last_sync_info(&self) -> Option<SyncUnlockInfo> {
        self.inner.lock().unwrap().last_sync_info.clone()
    }

    /// Ids passed to `touch` so far.
    #[must_use]
    pub fn touched_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().touched_ids.clone()
    }

    /// Ids passed to `delete` so far.
    #[must_use]
    pub fn deleted_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted_ids.clone()
    }

    /// Resets counters and recorded arguments; keeps records and failures.
    pub fn clear_invocations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open_count = 0;
        inner.close_count = 0;
        inner.ensure_unlocked_count = 0;
        inner.ensure_locked_count = 0;
        inner.sync_count = 0;
        inner.wipe_count = 0;
        inner.last_unlock_key = None;
        inner.last_sync_info = None;
        inner.touched_ids.clear();
        inner.deleted_ids.clear();
    }
}

impl LoginStore for MemoryLoginStore {
    fn open(&self) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.open_count += 1;
        inner.open = true;
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.close_count += 1;
        inner.open = false;
    }

    fn is_locked(&self) -> bool {
        self.inner.lock().unwrap().locked
    }

    fn ensure_unlocked(&self, key: &SecretString) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_unlocked_count += 1;
        inner.last_unlock_key = Some(key.expose_secret().to_string());
        if let Some(message) = &inner.unlock_failure {
            return Err(DataStoreError::engine(message.clone()));
        }
        inner.locked = false;
        Ok(())
    }

    fn ensure_locked(&self) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ensure_locked_count += 1;
        inner.locked = true;
        Ok(())
    }

    fn sync(&self, unlock_info: &SyncUnlockInfo) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sync_count += 1;
        inner.last_sync_info = Some(unlock_info.clone());
        if let Some(message) = &inner.sync_failure {
            return Err(DataStoreError::sync(message.clone()));
        }
        Ok(())
    }

    fn wipe_local(&self) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.wipe_count += 1;
        if let Some(message) = &inner.wipe_failure {
            return Err(DataStoreError::engine(message.clone()));
        }
        inner.records.clear();
        Ok(())
    }

    fn get(&self, id: &str) -> DataStoreResult<Option<LoginRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.iter().find(|record| record.id == id).cloned())
    }

    fn touch(&self, id: &str) -> DataStoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.touched_ids.push(id.to_string());
        if let Some(message) = &inner.touch_failure {
            return Err(DataStoreError::engine(message.clone()));
        }
        Ok(())
    }

    fn list(&self) -> DataStoreResult<Vec<LoginRecord>> {
        let inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.list_failure {
            return Err(DataStoreError::engine(message.clone()));
        }
        Ok(inner.records.clone())
    }

    fn delete(&self, id: &str) -> DataStoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.deleted_ids.push(id.to_string());
        if let Some(message) = &inner.delete_failure {
            return Err(DataStoreError::engine(message.clone()));
        }
        let before = inner.records.len();
        inner.records.retain(|record| record.id != id);
        Ok(inner.records.len() != before)
    }
}

// =============================================================================
// Memory Key Store
// =============================================================================

/// In-memory [`KeyStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryKeyStore {
    values: Mutex<HashMap<String, String>>,
    set_keys: Mutex<Vec<String>>,
    save_success: AtomicBool,
}

impl MemoryKeyStore {
    /// Creates an empty key store that accepts writes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            set_keys: Mutex::new(Vec::new()),
            save_success: AtomicBool::new(true),
        }
    }

    /// Makes subsequent `set` calls report failure without storing.
    pub fn set_save_success(&self, success: bool) {
        self.save_success.store(success, Ordering::SeqCst);
    }

    /// Seeds a value without counting as a recorded `set` call.
    pub fn seed(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Identifiers written through `set`, in call order.
    #[must_use]
    pub fn set_keys(&self) -> Vec<String> {
        self.set_keys.lock().unwrap().clone()
    }

    /// Raw stored value, for asserting what was persisted.
    #[must_use]
    pub fn stored(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl KeyStore for MemoryKeyStore {
    fn set(&self, key: &str, value: SecretString) -> bool {
        self.set_keys.lock().unwrap().push(key.to_string());
        if !self.save_success.load(Ordering::SeqCst) {
            return false;
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.expose_secret().to_string());
        true
    }

    fn has_value(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<SecretString> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|value| SecretString::from(value.clone()))
    }
}

// =============================================================================
// Memory Autolock Policy
// =============================================================================

#[derive(Default)]
struct AutolockInner {
    lock_required: bool,
    store_next_count: u32,
    forward_date_count: u32,
    back_date_count: u32,
}

/// In-memory [`AutolockPolicy`] with a stubbed lock-required answer.
#[derive(Default)]
pub struct MemoryAutolockPolicy {
    inner: Mutex<AutolockInner>,
}

impl MemoryAutolockPolicy {
    /// Creates a policy that reports lock not required.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stubs the `lock_currently_required` answer.
    pub fn set_lock_required(&self, required: bool) {
        self.inner.lock().unwrap().lock_required = required;
    }

    /// Number of `store_next_autolock_time` calls so far.
    #[must_use]
    pub fn store_next_count(&self) -> u32 {
        self.inner.lock().unwrap().store_next_count
    }

    /// Number of `forward_date_next_lock_time` calls so far.
    #[must_use]
    pub fn forward_date_count(&self) -> u32 {
        self.inner.lock().unwrap().forward_date_count
    }

    /// Number of `back_date_next_lock_time` calls so far.
    #[must_use]
    pub fn back_date_count(&self) -> u32 {
        self.inner.lock().unwrap().back_date_count
    }

    /// Resets the call counters; keeps the stubbed answer.
    pub fn clear_invocations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.store_next_count = 0;
        inner.forward_date_count = 0;
        inner.back_date_count = 0;
    }
}

impl AutolockPolicy for MemoryAutolockPolicy {
    fn lock_currently_required(&self) -> bool {
        self.inner.lock().unwrap().lock_required
    }

    fn store_next_autolock_time(&self) {
        self.inner.lock().unwrap().store_next_count += 1;
    }

    fn forward_date_next_lock_time(&self) {
        self.inner.lock().unwrap().forward_date_count += 1;
    }

    fn back_date_next_lock_time(&self) {
        self.inner.lock().unwrap().back_date_count += 1;
    }
}

// =============================================================================
// Memory Reachability
// =============================================================================

/// In-memory [`NetworkReachability`] with a settable answer.
pub struct MemoryReachability {
    connected: AtomicBool,
}

impl MemoryReachability {
    /// Creates a reachability signal with the given initial answer.
    #[must_use]
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Changes the connectivity answer.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MemoryReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkReachability for MemoryReachability {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================
