//! Top-level server entry point.
//!
//! `Server` is a thin construction layer: it wraps a [`Reactor`] sized to
//! the configured worker count, binds any extra configured listeners in
//! the background, and then runs the primary `(address, port)` listener's
//! accept loop on the calling task — the same shape as the teacher's
//! original `Server::run`, which blocked the caller on a single inline
//! accept loop. Everything the teacher's `run`/`read_request`/
//! `write_response`/`handle_client` used to do by hand (parsing,
//! validating, dispatching, writing the response) now lives in
//! [`crate::routing::dispatcher::Dispatcher`], reached through the
//! `Reactor`.

use crate::config::config;
use crate::net::reactor::Reactor;
use crate::routing::path_matcher::PathMatcher;
use std::sync::Arc;

pub struct Server {
    reactor: Arc<Reactor>,
}

impl Server {
    pub fn new(routes: PathMatcher) -> Self {
        let reactor = Reactor::new(Arc::new(routes), config().worker_count);
        Self { reactor }
    }

    /// Starts the HTTP server: binds every configured extra listener in
    /// the background, then binds and serves the primary `(address,
    /// port)` listener inline. Runs indefinitely.
    pub async fn run(&self) -> std::io::Result<()> {
        for listener_cfg in &config().listeners {
            self.reactor
                .add_listener((listener_cfg.address, listener_cfg.port))
                .await?;
            log::info!(
                "listening on {}:{} ({})",
                listener_cfg.address,
                listener_cfg.port,
                listener_cfg.protocol
            );
        }

        log::info!("listening on {}:{}", config().address, config().port);
        self.reactor
            .serve_primary((config().address, config().port))
            .await
    }

    pub fn open_connections(&self) -> usize {
        self.reactor.open_connections()
    }
}
