//! Bounded pool that bounds how many task resume-steps run concurrently
//! (§4.4). Kernel-level scheduling of the underlying OS threads is left to
//! `async-std`'s own executor; what this module owns is the admission
//! control — a fixed number of permits, one per configured worker, that a
//! connection task must hold before its `resume()`-equivalent (its request/
//! response cycle) runs.

use async_std::channel::{self, Receiver, Sender};

/// A bounded FIFO of resume-tokens, modeled as unit permits: acquiring one
/// is "popping a token", and dropping the held permit returns it to the
/// pool, matching a worker finishing `resume()` and going back to pick up
/// the next token.
pub struct JobQueue {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl JobQueue {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (tx, rx) = channel::bounded(worker_count);
        for _ in 0..worker_count {
            tx.try_send(()).expect("capacity matches worker_count");
        }
        Self { tx, rx }
    }

    /// Waits for a free worker slot, returning a guard that releases it
    /// back to the pool on drop.
    pub async fn acquire(&self) -> JobPermit {
        self.rx.recv().await.expect("job queue sender never dropped while self is alive");
        JobPermit { tx: self.tx.clone() }
    }
}

pub struct JobPermit {
    tx: Sender<()>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        let _ = self.tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[async_std::test]
    async fn admits_at_most_worker_count_concurrently() {
        let queue = Arc::new(JobQueue::new(2));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = queue.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(task::spawn(async move {
                let _permit = queue.acquire().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                task::sleep(Duration::from_millis(15)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await;
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
