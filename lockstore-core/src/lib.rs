//! Reactive state machine for a local encrypted credential store.
//!
//! The [`store::DataStore`] owns the lock state of an opaque encrypted
//! login store, the status of opportunistic remote synchronization, and the
//! last-known record list. It consumes two input streams — user-issued
//! [`action::DataStoreAction`]s and OS [`action::LifecycleAction`]s — and
//! republishes derived state on replay-latest `watch` streams.
//!
//! External systems (the storage engine, the secure key store, the autolock
//! policy, network reachability) are narrow traits in [`platform`],
//! injected at construction; [`platform::memory`] provides in-memory
//! implementations.
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use lockstore_core::{
//!     action::{DataStoreAction, LifecycleAction},
//!     autolock::TimedAutolockPolicy,
//!     bus::Bus,
//!     platform::memory::{MemoryKeyStore, MemoryLoginStore, MemoryReachability},
//!     store::DataStore,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let actions: Bus<DataStoreAction> = Bus::new();
//! let lifecycle: Bus<LifecycleAction> = Bus::new();
//!
//! let store = DataStore::new(
//!     Arc::new(MemoryLoginStore::new()),
//!     Arc::new(MemoryKeyStore::new()),
//!     Arc::new(TimedAutolockPolicy::new(Duration::from_secs(300))),
//!     Arc::new(MemoryReachability::new(true)),
//! );
//! let mut storage_state = store.storage_state();
//!
//! let driver = tokio::spawn(store.run(actions.subscribe(), lifecycle.subscribe()));
//!
//! actions.dispatch(DataStoreAction::Reset);
//! lifecycle.dispatch(LifecycleAction::Shutdown);
//!
//! drop(actions);
//! drop(lifecycle);
//! driver.await.unwrap();
//! assert_eq!(
//!     format!("{}", &*storage_state.borrow()),
//!     "Unprepared"
//! );
//! # }
//! ```

pub mod action;
pub mod autolock;
pub mod bus;
pub mod error;
pub mod platform;
pub mod record;
pub mod state;
pub mod store;

pub use action::{DataStoreAction, LifecycleAction, SyncCredential, SyncUnlockInfo};
pub use bus::{Bus, BusReceiver};
pub use error::{DataStoreError, DataStoreResult};
pub use record::LoginRecord;
pub use state::{StorageState, SyncState};
pub use store::DataStore;
