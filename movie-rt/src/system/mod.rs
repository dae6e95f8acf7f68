//! The actor system: guardians, spawning, system-level ask, extensions,
//! remoting enablement and shutdown.

pub mod actor_system;
pub(crate) mod core;
pub mod dispatcher;

pub use actor_system::ActorSystem;
pub use dispatcher::Dispatcher;

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::cell::spawn_child;
use crate::actor::signal::{SpawnFn, SystemSignal};
use crate::actor::{ActorRef, Behavior, SupervisionConfig};
use crate::config::Config;
use crate::error::{RtResult, RuntimeError};
use crate::message::Message;
use crate::path::Address;
use crate::scheduler::Scheduler;
use self::core::SystemCore;

/// Non-generic handle to a system, independent of its main message type.
///
/// This is what extensions receive at creation and what contexts expose
/// via [`ActorContext::system`](crate::actor::ActorContext::system). It
/// can spawn internal actors under `/system`, read configuration, and
/// reach the scheduler.
#[derive(Clone)]
pub struct SystemRef {
    core: Arc<SystemCore>,
}

impl SystemRef {
    pub(crate) fn new(core: Arc<SystemCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<SystemCore> {
        &self.core
    }

    /// The system name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// The system address (remote form once remoting is enabled).
    pub fn address(&self) -> Address {
        self.core.address()
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        self.core.config()
    }

    /// The system scheduler.
    pub fn scheduler(&self) -> Scheduler {
        self.core.scheduler().clone()
    }

    /// Spawn an internal actor under `/system`.
    ///
    /// The spawn runs inside the system guardian's loop; the returned
    /// future resolves once the child is registered.
    pub async fn spawn_system_actor<C: Message>(
        &self,
        name: &str,
        behavior: Behavior<C>,
        supervision: SupervisionConfig,
    ) -> RtResult<ActorRef<C>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let name = name.to_string();
        let spawn: SpawnFn = Box::new(move |core, parent| {
            let result = spawn_child::<C>(
                core,
                parent,
                behavior,
                supervision,
                Some(&name),
                Dispatcher::Parallel,
            );
            let _ = tx.send(result);
        });
        let guardian = self
            .core
            .system_guardian_tx()
            .ok_or_else(|| RuntimeError::failure("system guardian is not running"))?;
        guardian
            .send(SystemSignal::SpawnChild(spawn))
            .map_err(|_| RuntimeError::Shutdown)?;
        rx.await.map_err(|_| RuntimeError::Shutdown)?
    }
}
