//! The data-store state machine.
//!
//! `DataStore` owns the authoritative [`StorageState`]/[`SyncState`] pair
//! and the last-known record list, drives the injected collaborators, and
//! republishes derived state on `watch` channels. All inputs — bus actions,
//! lifecycle events, and internal sync completions — are applied on one
//! serial sequence by [`DataStore::run`]; no two transitions interleave.
//!
//! The remote sync call is the only operation allowed to be outstanding
//! while further inputs are processed. It runs on a blocking task and its
//! completion re-enters the sequence as an internal event carrying a
//! [`SyncTicket`]; generation counters on the ticket keep a stale
//! completion from regressing newer state.

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};

use crate::{
    action::{DataStoreAction, LifecycleAction, SyncCredential, SyncUnlockInfo},
    bus::BusReceiver,
    error::{DataStoreError, DataStoreResult},
    platform::{AutolockPolicy, KeyStore, LoginStore, NetworkReachability, STORE_KEY_ID},
    record::LoginRecord,
    state::{StorageState, SyncState},
};


// =============================================================================
// Sync tickets
// =============================================================================

/// Handle for one in-flight sync attempt.
///
/// Issued by [`DataStore::handle_action`] when a `SyncStart` actually starts
/// an engine sync; redeemed through [`DataStore::finish_sync`] once the
/// engine call resolves. The captured generations let `finish_sync` detect
/// that the world moved on while the call was outstanding.
#[derive(Debug)]
pub struct SyncTicket {
    sync_generation: u64,
    storage_generation: u64,
    unlock_info: SyncUnlockInfo,
}

type SyncCompletion = (SyncTicket, DataStoreResult<()>);

/// One input to the serial processing sequence.
enum Input {
    Action(DataStoreAction),
    Lifecycle(LifecycleAction),
    SyncDone(SyncTicket, DataStoreResult<()>),
    Idle,
}

// =============================================================================
// DataStore
// =============================================================================

/// Reactive owner of the encrypted login store's lifecycle.
pub struct DataStore {
    engine: Arc<dyn LoginStore>,
    keys: Arc<dyn KeyStore>,
    autolock: Arc<dyn AutolockPolicy>,
    network: Arc<dyn NetworkReachability>,
    storage_tx: watch::Sender<StorageState>,
    sync_tx: watch::Sender<SyncState>,
    list_tx: watch::Sender<Vec<LoginRecord>>,
    /// Bundle for the engine's sync calls. Installed by `UpdateCredentials`,
    /// forgotten on `Reset`. Not the store's key material: that stays in the
    /// key store and is fetched per unlock.
    sync_info: Option<SyncUnlockInfo>,
    /// Bumped on every storage-state transition.
    generation: u64,
    /// Bumped each time an engine sync is started.
    sync_generation: u64,
}

impl DataStore {
    /// Creates a data store over the injected collaborators.
    ///
    /// Initial derived state is `Unprepared` / `Synced` / empty list; the
    /// engine is untouched until the first input arrives.
    #[must_use]
    pub fn new(
        engine: Arc<dyn LoginStore>,
        keys: Arc<dyn KeyStore>,
        autolock: Arc<dyn AutolockPolicy>,
        network: Arc<dyn NetworkReachability>,
    ) -> Self {
        let (storage_tx, _) = watch::channel(StorageState::Unprepared);
        let (sync_tx, _) = watch::channel(SyncState::Synced);
        let (list_tx, _) = watch::channel(Vec::new());

        Self {
            engine,
            keys,
            autolock,
            network,
            storage_tx,
            sync_tx,
            list_tx,
            sync_info: None,
            generation: 0,
            sync_generation: 0,
        }
    }

    // =========================================================================
    // Derived streams and pass-through queries
    // =========================================================================

    /// Storage-state stream. Replays the latest value to new subscribers.
    #[must_use]
    pub fn storage_state(&self) -> watch::Receiver<StorageState> {
        self.storage_tx.subscribe()
    }

    /// Sync-state stream. Replays the latest value to new subscribers;
    /// the initial value is `Synced`.
    #[must_use]
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.sync_tx.subscribe()
    }

    /// Record-list stream, ordered by hostname then id.
    #[must_use]
    pub fn record_list(&self) -> watch::Receiver<Vec<LoginRecord>> {
        self.list_tx.subscribe()
    }

    /// Snapshot of the current storage state.
    #[must_use]
    pub fn current_storage_state(&self) -> StorageState {
        self.storage_tx.borrow().clone()
    }

    /// Looks up one record in the current in-memory list.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<LoginRecord> {
        self.list_tx
            .borrow()
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Snapshot of the current in-memory record list.
    #[must_use]
    pub fn list(&self) -> Vec<LoginRecord> {
        self.list_tx.borrow().clone()
    }

    // =========================================================================
    // Action handling
    // =========================================================================

    /// Applies one external action.
    ///
    /// Returns a [`SyncTicket`] when a `SyncStart` began an engine sync that
    /// the caller must drive to completion (see [`DataStore::finish_sync`]);
    /// every other action resolves fully within this call.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for actions refused by the current state (a
    /// no-op, not fatal); engine and key-store failures per the handling
    /// tables — credential/unlock failures leave the state `Errored`,
    /// `touch`/`delete` failures leave state unchanged.
    pub fn handle_action(
        &mut self,
        action: DataStoreAction,
    ) -> DataStoreResult<Option<SyncTicket>> {
        match action {
            DataStoreAction::Reset => self.reset().map(|()| None),
            DataStoreAction::UpdateCredentials(credential) => {
                self.update_credentials(&credential).map(|()| None)
            }
            DataStoreAction::Lock => self.lock().map(|()| None),
            DataStoreAction::Unlock => self.unlock().map(|()| None),
            DataStoreAction::Touch { id } => self.touch(&id).map(|()| None),
            DataStoreAction::Delete { id } => self.delete(&id).map(|()| None),
            DataStoreAction::SyncStart => self.sync_start(),
        }
    }

    fn reset(&mut self) -> DataStoreResult<()> {
        let result = self.engine.wipe_local();
        self.sync_info = None;
        // The store is unprepared after a reset whether or not the wipe
        // itself succeeded; the failure is still reported.
        self.set_storage_state(StorageState::Unprepared);
        result
    }

    fn update_credentials(&mut self, credential: &SyncCredential) -> DataStoreResult<()> {
        self.sync_info = Some(credential.sync_info.clone());

        if credential.is_new {
            self.persist_store_key().map_err(|err| self.fail_unlock(err))?;
        }

        self.open_and_unlock().map_err(|err| self.fail_unlock(err))?;

        self.set_storage_state(StorageState::Unlocked);
        self.refresh_record_list();
        Ok(())
    }

    fn lock(&mut self) -> DataStoreResult<()> {
        if !self.storage_tx.borrow().is_unlocked() {
            return Err(DataStoreError::InvalidTransition {
                action: "lock",
                state: self.current_storage_state(),
            });
        }

        self.autolock.back_date_next_lock_time();
        if let Err(err) = self.engine.ensure_locked() {
            // Best effort: the logical state still becomes Locked.
            tracing::warn!(%err, "engine lock failed");
        }
        self.set_storage_state(StorageState::Locked);
        Ok(())
    }

    fn unlock(&mut self) -> DataStoreResult<()> {
        if !matches!(&*self.storage_tx.borrow(), StorageState::Locked) {
            return Err(DataStoreError::InvalidTransition {
                action: "unlock",
                state: self.current_storage_state(),
            });
        }

        self.autolock.forward_date_next_lock_time();
        self.unlock_with_stored_key()
    }

    fn touch(&mut self, id: &str) -> DataStoreResult<()> {
        if !self.storage_tx.borrow().is_unlocked() {
            return Err(DataStoreError::InvalidTransition {
                action: "touch",
                state: self.current_storage_state(),
            });
        }
        self.engine.touch(id)
    }

    fn delete(&mut self, id: &str) -> DataStoreResult<()> {
        if !self.storage_tx.borrow().is_unlocked() {
            return Err(DataStoreError::InvalidTransition {
                action: "delete",
                state: self.current_storage_state(),
            });
        }
        let removed = self.engine.delete(id)?;
        if !removed {
            tracing::debug!(id, "delete for unknown record id");
        }
        self.refresh_record_list();
        Ok(())
    }

    fn sync_start(&mut self) -> DataStoreResult<Option<SyncTicket>> {
        if self.sync_tx.borrow().is_syncing() {
            tracing::debug!("sync already in flight; start ignored");
            return Ok(None);
        }

        if !self.network.is_connected() {
            // Skipped silently, not queued.
            self.set_sync_state(SyncState::Synced);
            return Ok(None);
        }

        let Some(unlock_info) = self.sync_info.clone() else {
            // No account configured; there is nothing to sync against.
            self.set_sync_state(SyncState::NotSyncable);
            return Ok(None);
        };

        self.sync_generation += 1;
        self.set_sync_state(SyncState::Syncing {
            suppress_notification: false,
        });

        Ok(Some(SyncTicket {
            sync_generation: self.sync_generation,
            storage_generation: self.generation,
            unlock_info,
        }))
    }

    /// Resolves an in-flight sync.
    ///
    /// A ticket from a superseded sync attempt is dropped: it must not
    /// resolve a newer attempt's `Syncing` state. The record-list refresh is
    /// additionally skipped when the storage state moved since the sync
    /// began.
    pub fn finish_sync(&mut self, ticket: SyncTicket, result: DataStoreResult<()>) {
        if ticket.sync_generation != self.sync_generation {
            tracing::debug!("stale sync completion dropped");
            return;
        }

        match result {
            Ok(()) => {
                self.set_sync_state(SyncState::Synced);
                let storage_unchanged = ticket.storage_generation == self.generation;
                if storage_unchanged && self.storage_tx.borrow().is_unlocked() {
                    self.refresh_record_list();
                }
            }
            Err(err) => {
                tracing::warn!(%err, "sync failed");
                self.set_sync_state(SyncState::TimedOut);
            }
        }
    }

    // =========================================================================
    // Lifecycle handling
    // =========================================================================

    /// Applies one OS lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns an error if re-opening the engine handle on foreground
    /// fails; background/shutdown are best-effort and infallible.
    pub fn handle_lifecycle(&mut self, event: LifecycleAction) -> DataStoreResult<()> {
        match event {
            LifecycleAction::Foreground => self.foreground(),
            LifecycleAction::Background => {
                if self.storage_tx.borrow().is_unlocked() {
                    self.autolock.store_next_autolock_time();
                }
                // Closing the handle does not change the logical lock state.
                self.engine.close();
                Ok(())
            }
            LifecycleAction::Shutdown => {
                self.engine.close();
                Ok(())
            }
        }
    }

    fn foreground(&mut self) -> DataStoreResult<()> {
        let state = self.current_storage_state();
        match state {
            // No key material: re-open the handle, attempt nothing else.
            StorageState::Unprepared => self.engine.open(),
            // A new UpdateCredentials or Reset is required to leave Errored;
            // foregrounding must not retry on its own.
            StorageState::Errored(_) => Ok(()),
            StorageState::Locked | StorageState::Unlocked => {
                self.engine.open()?;
                if self.autolock.lock_currently_required() {
                    if let Err(err) = self.engine.ensure_locked() {
                        tracing::warn!(%err, "engine lock failed");
                    }
                    self.set_storage_state(StorageState::Locked);
                    Ok(())
                } else {
                    self.unlock_with_stored_key()
                }
            }
        }
    }

    // =========================================================================
    // Driver loop
    // =========================================================================

    /// Consumes the action and lifecycle streams, applying every input in
    /// arrival order on this single sequence.
    ///
    /// Engine syncs run on blocking tasks; their completions re-enter the
    /// sequence through an internal channel. The loop ends once both input
    /// streams close and no sync is outstanding.
    pub async fn run(
        mut self,
        mut actions: BusReceiver<DataStoreAction>,
        mut lifecycle: BusReceiver<LifecycleAction>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<SyncCompletion>();
        let mut actions_open = true;
        let mut lifecycle_open = true;
        let mut pending_syncs: usize = 0;

        loop {
            if !actions_open && !lifecycle_open && pending_syncs == 0 {
                break;
            }

            let input = tokio::select! {
                action = actions.recv(), if actions_open => {
                    action.map_or_else(
                        || {
                            actions_open = false;
                            Input::Idle
                        },
                        Input::Action,
                    )
                }
                event = lifecycle.recv(), if lifecycle_open => {
                    event.map_or_else(
                        || {
                            lifecycle_open = false;
                            Input::Idle
                        },
                        Input::Lifecycle,
                    )
                }
                done = done_rx.recv(), if pending_syncs > 0 => {
                    done.map_or(Input::Idle, |(ticket, result)| {
                        Input::SyncDone(ticket, result)
                    })
                }
            };

            match input {
                Input::Action(action) => {
                    let name = action.name();
                    match self.handle_action(action) {
                        Ok(Some(ticket)) => {
                            pending_syncs += 1;
                            self.spawn_sync(ticket, done_tx.clone());
                        }
                        Ok(None) => {}
                        Err(err) if err.is_non_fatal() => {
                            tracing::debug!(action = name, %err, "action was a no-op");
                        }
                        Err(err) => {
                            tracing::warn!(action = name, %err, "action failed");
                        }
                    }
                }
                Input::Lifecycle(event) => {
                    if let Err(err) = self.handle_lifecycle(event) {
                        tracing::warn!(?event, %err, "lifecycle handling failed");
                    }
                }
                Input::SyncDone(ticket, result) => {
                    pending_syncs -= 1;
                    self.finish_sync(ticket, result);
                }
                Input::Idle => {}
            }
        }
    }

    fn spawn_sync(&self, ticket: SyncTicket, done_tx: mpsc::UnboundedSender<SyncCompletion>) {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let result = engine.sync(&ticket.unlock_info);
            // The loop may already be gone during teardown.
            let _ = done_tx.send((ticket, result));
        });
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// (Re)persists the store's encryption key, generating one on first use.
    fn persist_store_key(&mut self) -> DataStoreResult<()> {
        let key = if self.keys.has_value(STORE_KEY_ID) {
            self.keys
                .get(STORE_KEY_ID)
                .ok_or_else(|| DataStoreError::key_material("store encryption key vanished"))?
        } else {
            generate_store_key()
        };

        if !self.keys.set(STORE_KEY_ID, key) {
            return Err(DataStoreError::key_material(
                "key store refused the store encryption key",
            ));
        }
        Ok(())
    }

    fn open_and_unlock(&mut self) -> DataStoreResult<()> {
        // The key is fetched for this one unlock and dropped with it.
        let key = self
            .keys
            .get(STORE_KEY_ID)
            .ok_or_else(|| DataStoreError::key_material("no store encryption key persisted"))?;
        self.engine.open()?;
        self.engine.ensure_unlocked(&key)
    }

    fn unlock_with_stored_key(&mut self) -> DataStoreResult<()> {
        let unlocked = self
            .keys
            .get(STORE_KEY_ID)
            .ok_or_else(|| DataStoreError::key_material("no store encryption key persisted"))
            .and_then(|key| self.engine.ensure_unlocked(&key));

        match unlocked {
            Ok(()) => {
                self.set_storage_state(StorageState::Unlocked);
                self.refresh_record_list();
                Ok(())
            }
            Err(err) => Err(self.fail_unlock(err)),
        }
    }

    /// Marks the store errored and hands the failure back for reporting.
    fn fail_unlock(&mut self, err: DataStoreError) -> DataStoreError {
        self.set_storage_state(StorageState::Errored(err.to_string()));
        err
    }

    fn set_storage_state(&mut self, next: StorageState) {
        let changed = *self.storage_tx.borrow() != next;
        if changed {
            self.generation += 1;
            tracing::debug!(state = %next, "storage state transition");
        }
        // No decrypted records stay in memory while the store is not
        // logically unlocked.
        if matches!(next, StorageState::Locked | StorageState::Unprepared) {
            self.list_tx.send_replace(Vec::new());
        }
        self.storage_tx.send_replace(next);
    }

    fn set_sync_state(&mut self, next: SyncState) {
        tracing::debug!(state = %next, "sync state transition");
        self.sync_tx.send_replace(next);
    }

    fn refresh_record_list(&mut self) {
        match self.engine.list() {
            Ok(mut records) => {
                records.sort_by(|a, b| a.hostname.cmp(&b.hostname).then_with(|| a.id.cmp(&b.id)));
                self.list_tx.send_replace(records);
            }
            Err(err) => {
                tracing::warn!(%err, "record list refresh failed; keeping previous list");
            }
        }
    }
}

/// Generates a fresh symmetric key for the encrypted store, hex encoded.
fn generate_store_key() -> SecretString {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    SecretString::from(hex::encode(bytes))
}
