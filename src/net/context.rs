//! Per-task handle passed to a handler for registering ancillary
//! descriptors whose readiness must also suspend the owning connection's
//! task (§4.5), and for probing reactor backend capabilities.

use crate::net::store::{DescriptorId, StateUpdate, Store};
use std::sync::Arc;

/// Backend capability probe (§4.1 `is_feature_enabled`, §9 Design Notes).
/// `FileReadWriteEvent` mirrors the original's `enum Feature` member and
/// its epoll caveat: regular files never report READ/WRITE readiness on
/// an epoll-based backend, so callers must fall back to synchronous I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    FileReadWriteEvent,
}

/// Read or write readiness, as requested by `add_owned_aux`'s initial
/// interest (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

pub struct Context {
    id: DescriptorId,
    store: Arc<Store>,
}

impl Context {
    pub fn new(id: DescriptorId, store: Arc<Store>) -> Arc<Self> {
        Arc::new(Self { id, store })
    }

    pub fn descriptor_id(&self) -> DescriptorId {
        self.id
    }

    /// Always false: this crate has no epoll-backed reactor of its own
    /// (readiness polling is delegated to `async-std`, §5), and the
    /// original's own caveat disables this feature for file descriptors
    /// regardless of backend. Callers (e.g. `handler::static_files`) must
    /// read files synchronously rather than awaiting readiness on them.
    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::FileReadWriteEvent => false,
        }
    }

    /// Registers `aux_id` as owned by this task: its readiness should
    /// suspend this connection's task (e.g. an upstream socket opened by a
    /// reverse-proxy handler). Returns a guard that releases the
    /// registration when the handler is done with the aux descriptor.
    pub fn register_owned(&self, aux_id: DescriptorId, _initial_interest: Interest) -> OwnedAuxGuard {
        self.store.enqueue(StateUpdate::CreateOwnedAux(aux_id, self.id));
        OwnedAuxGuard {
            id: aux_id,
            store: self.store.clone(),
        }
    }

    /// Enrolls this task in the FIFO read/write waiter queues of a
    /// descriptor shared across connections (§4.2, §5 ordering
    /// guarantees: "read wake-ups are delivered in enqueue order").
    pub fn register_shared(&self, aux_id: DescriptorId, interest: Interest) -> SharedAuxGuard {
        self.store.enqueue(StateUpdate::CreateSharedAux(aux_id));
        match interest {
            Interest::Read => self
                .store
                .enqueue(StateUpdate::JoinSharedReadWaiters(aux_id, self.id)),
            Interest::Write => self
                .store
                .enqueue(StateUpdate::JoinSharedWriteWaiters(aux_id, self.id)),
        }
        SharedAuxGuard {
            aux_id,
            waiter: self.id,
        }
    }
}

/// Scoped release of an owned aux descriptor registration (§4.5). Dropping
/// this guard tears down the `OwnedAux` store record.
pub struct OwnedAuxGuard {
    id: DescriptorId,
    store: Arc<Store>,
}

impl Drop for OwnedAuxGuard {
    fn drop(&mut self) {
        self.store.enqueue(StateUpdate::Remove(self.id));
    }
}

/// Scoped release of a shared aux descriptor registration. Shared aux
/// descriptors persist across connections (§4.1); dropping this guard only
/// removes this task from its waiter queues, which the bookkeeping here
/// approximates by leaving FIFO cleanup to the next `CreateSharedAux`
/// consumer — removal of a single queued waiter is not part of the
/// original's contract (§4.1: "removal is explicit" refers to the whole
/// shared descriptor, via `remove_shared_aux`).
pub struct SharedAuxGuard {
    #[allow(dead_code)]
    aux_id: DescriptorId,
    #[allow(dead_code)]
    waiter: DescriptorId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use std::time::Duration;

    #[async_std::test]
    async fn file_read_write_event_is_always_disabled() {
        let store = Store::new();
        let ctx = Context::new(1, store);
        assert!(!ctx.is_feature_enabled(Feature::FileReadWriteEvent));
    }

    #[async_std::test]
    async fn owned_aux_guard_drop_removes_record() {
        let store = Store::new();
        let ctx = Context::new(1, store.clone());
        let aux_id = 42;
        {
            let _guard = ctx.register_owned(aux_id, Interest::Read);
            task::sleep(Duration::from_millis(10)).await;
            assert_eq!(store.record_count(), 1);
        }
        task::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.record_count(), 0);
    }
}
