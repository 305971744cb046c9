//! One-shot scheduled callbacks (§4.1 `add_timer`/`remove_timer`, §4.11
//! Timer wheel). Used for idle-connection teardown and for ad hoc
//! control-plane scheduling; removed automatically after firing (§3
//! Lifecycle: "Timer removed automatically after firing (one-shot)").

use crate::net::store::{DescriptorId, StateUpdate, Store};
use async_std::task;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type TimerId = DescriptorId;

/// Scheduled-callback registry backed by the shared [`Store`] for record
/// bookkeeping. Each call to [`TimerWheel::schedule`] spawns its own
/// sleeping task rather than sharing one wheel thread, since `async-std`
/// gives every task its own independently-resumed sleep — the "wheel" is
/// the logical abstraction (one registry, one id space), not a single
/// polling loop, matching the allowance in Design Notes §9 that a
/// reimplementation may use "platform-native async tasks driven by a
/// custom executor."
pub struct TimerWheel {
    store: Arc<Store>,
    cancelled: Mutex<HashMap<TimerId, Arc<AtomicBool>>>,
}

impl TimerWheel {
    pub fn new(store: Arc<Store>) -> Arc<Self> {
        Arc::new(Self {
            store,
            cancelled: Mutex::new(HashMap::new()),
        })
    }

    /// Schedules `callback` to run once, after `period` has elapsed,
    /// unless cancelled first via [`TimerWheel::remove_timer`].
    pub fn add_timer<F>(self: &Arc<Self>, period: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.store.allocate_id();
        let flag = Arc::new(AtomicBool::new(false));
        self.cancelled.lock().unwrap().insert(id, flag.clone());
        self.store.enqueue(StateUpdate::CreateTimer(id));

        let wheel = self.clone();
        task::spawn(async move {
            task::sleep(period).await;
            if !flag.load(Ordering::Acquire) {
                callback();
            }
            wheel.cancelled.lock().unwrap().remove(&id);
            wheel.store.enqueue(StateUpdate::Remove(id));
        });

        id
    }

    /// Cancels a pending timer. A no-op if the timer already fired or was
    /// never registered.
    pub fn remove_timer(&self, id: TimerId) {
        if let Some(flag) = self.cancelled.lock().unwrap().get(&id) {
            flag.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::channel;
    use std::time::Duration;

    #[async_std::test]
    async fn timer_fires_after_period() {
        let store = Store::new();
        let wheel = TimerWheel::new(store);
        let (tx, rx) = channel::bounded(1);
        wheel.add_timer(Duration::from_millis(10), move || {
            let _ = tx.try_send(());
        });
        rx.recv().await.unwrap();
    }

    #[async_std::test]
    async fn cancelled_timer_never_fires() {
        let store = Store::new();
        let wheel = TimerWheel::new(store);
        let (tx, rx) = channel::bounded(1);
        let id = wheel.add_timer(Duration::from_millis(30), move || {
            let _ = tx.try_send(());
        });
        wheel.remove_timer(id);
        let result = async_std::future::timeout(Duration::from_millis(60), rx.recv()).await;
        assert!(result.is_err(), "cancelled timer must not fire");
    }
}
