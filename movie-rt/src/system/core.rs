//! Shared kernel state: one `SystemCore` per actor system.
//!
//! Everything system-scoped lives here: address, config, path registry,
//! scheduler, dispatchers, extensions, pending asks: behind one `Arc`
//! threaded through cells, contexts and refs. Nothing in this module is
//! public API.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

// Layer 3: Internal module imports
use crate::actor::signal::SystemSignal;
use crate::config::Config;
use crate::error::{RtResult, RuntimeError};
use crate::extension::Extensions;
use crate::future::{Promise, RuntimeFuture};
use crate::path::{ActorPath, Address};
use crate::registry::PathRegistry;
use crate::remote::extension::RemotingExtension;
use crate::scheduler::Scheduler;
use crate::system::dispatcher::Dispatchers;
use crate::util::CorrelationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemState {
    Running,
    ShuttingDown,
    Stopped,
}

type AskFailer = Arc<dyn Fn(RuntimeError) -> bool + Send + Sync>;

pub(crate) struct SystemCore {
    name: String,
    address: RwLock<Address>,
    config: Config,
    mailbox_capacity: usize,
    registry: PathRegistry,
    scheduler: Scheduler,
    dispatchers: Dispatchers,
    extensions: Extensions,
    pending_asks: DashMap<CorrelationId, AskFailer>,
    system_guardian_tx: OnceLock<UnboundedSender<SystemSignal>>,
    root_tx: OnceLock<UnboundedSender<SystemSignal>>,
    root_terminated: AtomicBool,
    root_done: Notify,
    state: RwLock<SystemState>,
    remoting_bind: Mutex<Option<(String, u16)>>,
    remoting: OnceLock<Arc<RemotingExtension>>,
}

impl SystemCore {
    /// Build the core. Must run inside a tokio runtime (the scheduler
    /// worker and dispatchers attach to it).
    pub(crate) fn new(name: String, config: Config) -> RtResult<Arc<Self>> {
        let address = Address::local(&name)?;
        let mailbox_capacity = config.get_int_or("system.mailbox-capacity", 1024)?;
        if mailbox_capacity <= 0 {
            return Err(RuntimeError::BadConfig(
                "system.mailbox-capacity must be positive".to_string(),
            ));
        }
        Ok(Arc::new(Self {
            registry: PathRegistry::new(name.as_str()),
            name,
            address: RwLock::new(address),
            config,
            mailbox_capacity: mailbox_capacity as usize,
            scheduler: Scheduler::new(),
            dispatchers: Dispatchers::new(),
            extensions: Extensions::new(),
            pending_asks: DashMap::new(),
            system_guardian_tx: OnceLock::new(),
            root_tx: OnceLock::new(),
            root_terminated: AtomicBool::new(false),
            root_done: Notify::new(),
            state: RwLock::new(SystemState::Running),
            remoting_bind: Mutex::new(None),
            remoting: OnceLock::new(),
        }))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn address(&self) -> Address {
        self.address.read().clone()
    }

    /// Swap to the remote address form once remoting is bound.
    pub(crate) fn set_address(&self, address: Address) {
        *self.address.write() = address;
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    pub(crate) fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn dispatchers(&self) -> &Dispatchers {
        &self.dispatchers
    }

    pub(crate) fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Synthetic path for an anonymous asker.
    pub(crate) fn temp_ask_path(&self, correlation_id: CorrelationId) -> ActorPath {
        ActorPath::from_parts(
            self.address(),
            vec![
                "temp".to_string(),
                format!("ask-{}", correlation_id.short()),
            ],
        )
    }

    /// Track an outstanding ask so system shutdown can fail it.
    pub(crate) fn track_pending_ask<T: Clone + Send + 'static>(
        self: &Arc<Self>,
        correlation_id: CorrelationId,
        promise: &Promise<T>,
        future: &RuntimeFuture<T>,
    ) {
        let failer: AskFailer = {
            let promise = promise.clone();
            Arc::new(move |error| promise.try_failure(error))
        };
        self.pending_asks.insert(correlation_id, failer);

        // Whatever the outcome, the entry goes away with it.
        let on_done = {
            let core = Arc::clone(self);
            move || {
                core.pending_asks.remove(&correlation_id);
            }
        };
        {
            let on_done = on_done.clone();
            future.on_success(move |_| on_done());
        }
        {
            let on_done = on_done.clone();
            future.on_failure(move |_| on_done());
        }
        future.on_cancel(on_done);
    }

    /// Fail every outstanding ask (system termination).
    pub(crate) fn fail_pending_asks(&self, error: RuntimeError) {
        let correlations: Vec<CorrelationId> =
            self.pending_asks.iter().map(|e| *e.key()).collect();
        for correlation_id in correlations {
            if let Some((_, failer)) = self.pending_asks.remove(&correlation_id) {
                failer(error.clone());
            }
        }
    }

    pub(crate) fn set_system_guardian(&self, tx: UnboundedSender<SystemSignal>) {
        let _ = self.system_guardian_tx.set(tx);
    }

    pub(crate) fn system_guardian_tx(&self) -> Option<UnboundedSender<SystemSignal>> {
        self.system_guardian_tx.get().cloned()
    }

    pub(crate) fn set_root(&self, tx: UnboundedSender<SystemSignal>) {
        let _ = self.root_tx.set(tx);
    }

    pub(crate) fn root_tx(&self) -> Option<UnboundedSender<SystemSignal>> {
        self.root_tx.get().cloned()
    }

    pub(crate) fn mark_root_terminated(&self) {
        self.root_terminated.store(true, Ordering::Release);
        self.root_done.notify_waiters();
    }

    pub(crate) async fn await_root_terminated(&self) {
        loop {
            let notified = self.root_done.notified();
            if self.root_terminated.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Transition `Running -> ShuttingDown`; false if already past it.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let mut state = self.state.write();
        if *state != SystemState::Running {
            return false;
        }
        *state = SystemState::ShuttingDown;
        true
    }

    pub(crate) fn mark_stopped(&self) {
        *self.state.write() = SystemState::Stopped;
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.state.read() == SystemState::Running
    }

    pub(crate) fn set_remoting_bind(&self, host: String, port: u16) {
        *self.remoting_bind.lock() = Some((host, port));
    }

    pub(crate) fn take_remoting_bind(&self) -> Option<(String, u16)> {
        self.remoting_bind.lock().take()
    }

    pub(crate) fn set_remoting(&self, extension: Arc<RemotingExtension>) {
        let _ = self.remoting.set(extension);
    }

    pub(crate) fn remoting(&self) -> Option<Arc<RemotingExtension>> {
        self.remoting.get().cloned()
    }
}
