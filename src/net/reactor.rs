//! The readiness-polling engine (§4.1). Kernel-level polling for socket
//! readiness is delegated to `async-std`'s own executor (§5); what this
//! module owns is everything the spec's Reactor contract is actually
//! responsible for above that layer: admitting accepted connections
//! through the [`JobQueue`], attaching each one's [`Context`], driving it
//! through the [`Dispatcher`], and keeping the [`Store`] and [`TimerWheel`]
//! that back the rest of the runtime.

use crate::config::config;
use crate::net::context::{Context, Feature};
use crate::net::job_queue::JobQueue;
use crate::net::store::{StateUpdate, Store};
use crate::net::timer::TimerWheel;
use crate::routing::dispatcher::Dispatcher;
use crate::routing::path_matcher::PathMatcher;
use async_std::net::{TcpListener, TcpStream};
use async_std::task;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Reactor {
    store: Arc<Store>,
    job_queue: Arc<JobQueue>,
    timers: Arc<TimerWheel>,
    routes: Arc<PathMatcher>,
    stopping: AtomicBool,
}

impl Reactor {
    pub fn new(routes: Arc<PathMatcher>, worker_count: usize) -> Arc<Self> {
        let store = Store::new();
        let timers = TimerWheel::new(store.clone());
        Arc::new(Self {
            store,
            job_queue: Arc::new(JobQueue::new(worker_count)),
            timers,
            routes,
            stopping: AtomicBool::new(false),
        })
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::FileReadWriteEvent => false,
        }
    }

    pub fn open_connections(&self) -> usize {
        self.store.open_connections()
    }

    /// `add_timer` (§4.1): schedules a one-shot callback, independent of
    /// any connection.
    pub fn add_timer<F>(self: &Arc<Self>, period: std::time::Duration, callback: F) -> crate::net::timer::TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.timers.add_timer(period, callback)
    }

    pub fn remove_timer(&self, id: crate::net::timer::TimerId) {
        self.timers.remove_timer(id);
    }

    /// `add_listener` (§4.1): binds `addr`, installs the accept task, and
    /// runs its accept loop on a spawned background task.
    pub async fn add_listener(self: &Arc<Self>, addr: (IpAddr, u16)) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let listener_id = self.store.allocate_id();
        self.store.enqueue(StateUpdate::CreateListener(listener_id));
        let reactor = self.clone();
        task::spawn(async move {
            reactor.accept_loop(listener, listener_id).await;
        });
        Ok(())
    }

    /// Runs a listener's accept loop on the *current* task instead of
    /// spawning one, so the caller (typically `main`) naturally blocks on
    /// the server's lifetime the way the teacher's original `Server::run`
    /// does.
    pub async fn serve_primary(self: &Arc<Self>, addr: (IpAddr, u16)) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let listener_id = self.store.allocate_id();
        self.store.enqueue(StateUpdate::CreateListener(listener_id));
        self.accept_loop(listener, listener_id).await;
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, listener_id: u64) {
        loop {
            if self.stopping.load(Ordering::Acquire) {
                break;
            }
            match listener.accept().await {
                Ok((stream, _addr)) => self.add_connection(stream),
                Err(e) => {
                    log::error!("accept failed on listener {listener_id}: {e}");
                }
            }
        }
        self.store.enqueue(StateUpdate::Remove(listener_id));
    }

    /// `add_connection` (§4.1): creates a `Connection` record, attaches a
    /// fresh `Context`, and spawns the connection's task bounded by the
    /// `JobQueue`'s admission control.
    fn add_connection(self: &Arc<Self>, stream: TcpStream) {
        let conn_id = self.store.allocate_id();
        self.store.enqueue(StateUpdate::CreateConnection(conn_id));
        let reactor = self.clone();
        task::spawn(async move {
            let _permit = reactor.job_queue.acquire().await;
            let context = Context::new(conn_id, reactor.store.clone());
            let dispatcher = Dispatcher::new(&reactor.routes, config().idle_timeout);
            dispatcher.serve(stream, context).await;
            reactor.store.enqueue(StateUpdate::Remove(conn_id));
        });
    }

    /// Stops accepting new connections; in-flight connections run to
    /// their natural `Done` (§5 "Cancellation and timeout": `stop_soft`).
    pub fn stop_soft(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Best-effort immediate stop: same as `stop_soft` since this crate
    /// has no forced-cancellation mechanism for tasks already running a
    /// handler — `async-std` tasks are not cancelled by dropping their
    /// `JoinHandle` (see DESIGN.md for why `stop_hard`'s bounded grace
    /// period is not implemented as a hard kill).
    pub fn stop_hard(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}
