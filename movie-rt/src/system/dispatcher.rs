//! Dispatcher flavors: where an actor's cooperative task runs.

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use tokio::sync::Notify;
use tracing::error;

// Layer 3: Internal module imports
// (none)

/// Placement of an actor's task, chosen at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatcher {
    /// Work-stealing thread pool shared by most actors (the default).
    #[default]
    Parallel,
    /// One dedicated OS thread for this actor. Use for blocking or
    /// isolation-sensitive work.
    Pinned,
    /// A single shared thread running many cooperative tasks; actors
    /// assigned here get single-threaded semantics relative to each
    /// other.
    Concurrent,
}

/// Runtime handles backing the dispatcher flavors.
pub(crate) struct Dispatchers {
    main: tokio::runtime::Handle,
    concurrent: OnceLock<tokio::runtime::Handle>,
    stop: Arc<Notify>,
}

impl Dispatchers {
    /// Capture the ambient runtime as the parallel dispatcher.
    pub(crate) fn new() -> Self {
        Self {
            main: tokio::runtime::Handle::current(),
            concurrent: OnceLock::new(),
            stop: Arc::new(Notify::new()),
        }
    }

    /// Run `future` on the requested dispatcher.
    pub(crate) fn spawn(&self, flavor: Dispatcher, future: impl Future<Output = ()> + Send + 'static) {
        match flavor {
            Dispatcher::Parallel => {
                self.main.spawn(future);
            }
            Dispatcher::Pinned => {
                let spawned = std::thread::Builder::new()
                    .name("movie-rt-pinned".to_string())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(rt) => rt.block_on(future),
                            Err(error) => {
                                error!(%error, "failed to build pinned dispatcher runtime")
                            }
                        }
                    });
                if let Err(error) = spawned {
                    error!(%error, "failed to start pinned dispatcher thread");
                }
            }
            Dispatcher::Concurrent => {
                self.concurrent_handle().spawn(future);
            }
        }
    }

    /// The shared single-thread runtime, started lazily.
    fn concurrent_handle(&self) -> tokio::runtime::Handle {
        self.concurrent
            .get_or_init(|| {
                let (handle_tx, handle_rx) = std::sync::mpsc::channel();
                let stop = Arc::clone(&self.stop);
                let spawned = std::thread::Builder::new()
                    .name("movie-rt-concurrent".to_string())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(rt) => {
                                let _ = handle_tx.send(rt.handle().clone());
                                rt.block_on(async move { stop.notified().await });
                            }
                            Err(error) => {
                                error!(%error, "failed to build concurrent dispatcher runtime")
                            }
                        }
                    });
                if let Err(error) = spawned {
                    error!(%error, "failed to start concurrent dispatcher thread");
                }
                // Fall back to the shared pool if the thread never came up;
                // semantics degrade but nothing is lost.
                handle_rx.recv().unwrap_or_else(|_| self.main.clone())
            })
            .clone()
    }

    /// Release the concurrent dispatcher thread.
    pub(crate) fn shutdown(&self) {
        self.stop.notify_waiters();
    }
}
