//! Process-wide registry of live descriptor records (§3 Data model, §4.2).
//!
//! A "descriptor" here is a logical id, not a raw OS file descriptor —
//! `async-std` owns the raw fd and its readiness polling (§5: "actual
//! kernel-level readiness polling is delegated to async-std's own
//! reactor"). What the original source's `Store` protects — a single
//! logical mutator draining a cross-thread update queue instead of
//! mutating records from arbitrary call sites — is preserved: every
//! mutation is a [`StateUpdate`] enqueued onto a channel drained by one
//! background task, never applied inline by the caller.

use async_std::channel::{self, Receiver, Sender};
use async_std::task;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type DescriptorId = u64;

/// One of the five record kinds a descriptor can hold (§3 Data model).
pub enum StoreRecord {
    Listener,
    Connection,
    OwnedAux { owner: DescriptorId },
    SharedAux {
        read_waiters: VecDeque<DescriptorId>,
        write_waiters: VecDeque<DescriptorId>,
    },
    Timer,
}

/// Cross-thread mutation requests, applied only by the store's own drain
/// task (§4.2 StoreUpdate variants). `RestoreRead`/`RestoreWrite` are
/// emitted when a yielding task wants to be rewoken on read or write
/// readiness respectively; this crate's tasks suspend on socket I/O
/// through `async-std`'s awaited futures instead, so those two variants
/// are accepted for API completeness and currently no-ops on arrival.
pub enum StateUpdate {
    CreateListener(DescriptorId),
    CreateConnection(DescriptorId),
    CreateOwnedAux(DescriptorId, DescriptorId),
    CreateSharedAux(DescriptorId),
    CreateTimer(DescriptorId),
    Remove(DescriptorId),
    ExternallyClosed(DescriptorId),
    RestoreRead(DescriptorId),
    RestoreWrite(DescriptorId),
    /// A task waiting on a shared aux descriptor joins its FIFO queue.
    JoinSharedReadWaiters(DescriptorId, DescriptorId),
    JoinSharedWriteWaiters(DescriptorId, DescriptorId),
}

pub struct Store {
    next_id: AtomicU64,
    records: Mutex<std::collections::HashMap<DescriptorId, StoreRecord>>,
    open_connections: AtomicUsize,
    update_tx: Sender<StateUpdate>,
}

impl Store {
    /// Spawns the background drain task and returns a handle shared by
    /// every thread that needs to enqueue a mutation.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = channel::unbounded();
        let store = Arc::new(Self {
            next_id: AtomicU64::new(1),
            records: Mutex::new(std::collections::HashMap::new()),
            open_connections: AtomicUsize::new(0),
            update_tx: tx,
        });
        let drain_store = store.clone();
        task::spawn(async move { drain_store.drain_loop(rx).await });
        store
    }

    pub fn allocate_id(&self) -> DescriptorId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    /// Enqueues a mutation; never applied on the caller's own task, only
    /// by the drain loop (§4.2: "mutations are serialized through the
    /// reactor thread").
    pub fn enqueue(&self, update: StateUpdate) {
        if self.update_tx.try_send(update).is_err() {
            log::error!("store update queue closed; dropping update");
        }
    }

    async fn drain_loop(self: Arc<Self>, rx: Receiver<StateUpdate>) {
        while let Ok(update) = rx.recv().await {
            self.apply(update);
        }
    }

    fn apply(&self, update: StateUpdate) {
        let mut records = self.records.lock().expect("store mutex poisoned");
        match update {
            StateUpdate::CreateListener(id) => {
                records.insert(id, StoreRecord::Listener);
            }
            StateUpdate::CreateConnection(id) => {
                records.insert(id, StoreRecord::Connection);
                drop(records);
                self.open_connections.fetch_add(1, Ordering::Relaxed);
            }
            StateUpdate::CreateOwnedAux(id, owner) => {
                records.insert(id, StoreRecord::OwnedAux { owner });
            }
            StateUpdate::CreateSharedAux(id) => {
                records.entry(id).or_insert_with(|| StoreRecord::SharedAux {
                    read_waiters: VecDeque::new(),
                    write_waiters: VecDeque::new(),
                });
            }
            StateUpdate::CreateTimer(id) => {
                records.insert(id, StoreRecord::Timer);
            }
            StateUpdate::JoinSharedReadWaiters(id, waiter) => {
                if let Some(StoreRecord::SharedAux { read_waiters, .. }) = records.get_mut(&id) {
                    read_waiters.push_back(waiter);
                }
            }
            StateUpdate::JoinSharedWriteWaiters(id, waiter) => {
                if let Some(StoreRecord::SharedAux { write_waiters, .. }) = records.get_mut(&id) {
                    write_waiters.push_back(waiter);
                }
            }
            StateUpdate::Remove(id) | StateUpdate::ExternallyClosed(id) => {
                let removed = records.remove(&id);
                if matches!(removed, Some(StoreRecord::Connection)) {
                    drop(records);
                    self.open_connections.fetch_sub(1, Ordering::Relaxed);
                }
            }
            StateUpdate::RestoreRead(_) | StateUpdate::RestoreWrite(_) => {
                // Re-arm is implicit: the task's next `.await` on the
                // socket already suspends it on the underlying reactor.
            }
        }
    }

    #[cfg(test)]
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[async_std::test]
    async fn connection_create_and_remove_tracks_open_count() {
        let store = Store::new();
        let id = store.allocate_id();
        store.enqueue(StateUpdate::CreateConnection(id));
        task::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.open_connections(), 1);
        assert_eq!(store.record_count(), 1);

        store.enqueue(StateUpdate::Remove(id));
        task::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.record_count(), 0);
    }

    #[async_std::test]
    async fn shared_aux_waiters_join_fifo_order() {
        let store = Store::new();
        let aux = store.allocate_id();
        store.enqueue(StateUpdate::CreateSharedAux(aux));
        store.enqueue(StateUpdate::JoinSharedReadWaiters(aux, 10));
        store.enqueue(StateUpdate::JoinSharedReadWaiters(aux, 11));
        task::sleep(Duration::from_millis(20)).await;

        let records = store.records.lock().unwrap();
        match records.get(&aux) {
            Some(StoreRecord::SharedAux { read_waiters, .. }) => {
                assert_eq!(read_waiters.iter().copied().collect::<Vec<_>>(), vec![10, 11]);
            }
            _ => panic!("expected SharedAux record"),
        }
    }

    #[async_std::test]
    async fn unrelated_remove_does_not_affect_open_connections() {
        let store = Store::new();
        let listener_id = store.allocate_id();
        store.enqueue(StateUpdate::CreateListener(listener_id));
        task::sleep(Duration::from_millis(20)).await;
        store.enqueue(StateUpdate::Remove(listener_id));
        task::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.open_connections(), 0);
    }
}
