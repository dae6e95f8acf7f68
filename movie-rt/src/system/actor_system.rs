//! Main actor system implementation.
//!
//! An `ActorSystem<M>` hosts a guardian tree rooted at `/`: the `/user`
//! guardian runs the user-supplied main behavior of the system's declared
//! message type `M`; `/system` hosts internal actors (extensions,
//! remoting helpers). Messages told to the system route to `/user`.

// Layer 1: Standard library
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

// Layer 3: Internal
use super::core::SystemCore;
use super::dispatcher::Dispatcher;
use super::SystemRef;
use crate::actor::cell::{make_root, spawn_child};
use crate::actor::refs::RefVariant;
use crate::actor::signal::SystemSignal;
use crate::actor::{ActorRef, Behavior, SupervisionConfig};
use crate::config::Config;
use crate::error::{RtResult, RuntimeError};
use crate::extension::ExtensionId;
use crate::future::RuntimeFuture;
use crate::message::Message;
use crate::path::{ActorPath, Address};
use crate::remote::extension::{RemotingExtension, RemotingExtensionId};
use crate::remote::remote_ref::RemoteRef;

/// Message type of the guardian cells; they only ever react to the
/// system lane.
#[derive(Debug, Clone)]
pub(crate) struct GuardianMsg;

impl Message for GuardianMsg {
    const MESSAGE_TYPE: &'static str = "guardian";
}

/// A running actor system.
///
/// # Example
/// ```rust,no_run
/// use movie_rt::prelude::*;
///
/// #[derive(Debug, Clone)]
/// struct Greet(String);
/// impl Message for Greet {
///     const MESSAGE_TYPE: &'static str = "greet";
/// }
///
/// # #[tokio::main] async fn main() -> movie_rt::error::RtResult<()> {
/// let main_behavior = Behavior::receive(|_ctx, Greet(who): Greet| {
///     println!("hello, {who}");
///     Ok(Transition::Same)
/// });
/// let system = ActorSystem::new("greeter", main_behavior, Config::empty())?;
/// system.tell(Greet("movie".to_string()));
/// system.shutdown().await?;
/// # Ok(()) }
/// ```
pub struct ActorSystem<M: Message> {
    core: Arc<SystemCore>,
    user: ActorRef<M>,
}

impl<M: Message> ActorSystem<M> {
    /// Start a system with the given main behavior at `/user`.
    ///
    /// `name` wins over the configured `name`; an empty name falls back
    /// to the configuration and finally to a generated one. The supplied
    /// config is layered over [`Config::runtime_defaults`]. Must be
    /// called inside a tokio runtime.
    pub fn new(name: &str, behavior: Behavior<M>, config: Config) -> RtResult<Self> {
        let config = config.with_fallback(&Config::runtime_defaults());
        let name = if !name.is_empty() {
            name.to_string()
        } else {
            let configured = config.get_string_or("name", "")?;
            if !configured.is_empty() {
                configured
            } else {
                let generated = Uuid::new_v4().simple().to_string();
                format!("system-{}", &generated[..8])
            }
        };

        let core = SystemCore::new(name, config)?;
        let (root_state, root_cell) = make_root(&core, Behavior::<GuardianMsg>::ignore());
        core.set_root(root_state.system_tx.clone());

        let supervision = SupervisionConfig::from_config(core.config())?;
        let user = spawn_child::<M>(
            &core,
            &root_state,
            behavior,
            supervision,
            Some("user"),
            Dispatcher::Parallel,
        )?;
        let system_guardian = spawn_child::<GuardianMsg>(
            &core,
            &root_state,
            Behavior::ignore(),
            SupervisionConfig::restart(),
            Some("system"),
            Dispatcher::Parallel,
        )?;
        if let RefVariant::Local(local) = &system_guardian.variant {
            core.set_system_guardian(local.sender.system_sender());
        }
        core.dispatchers().spawn(Dispatcher::Parallel, root_cell.run());

        debug!(system = core.name(), "actor system started");
        Ok(Self { core, user })
    }

    /// The system name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// The system address; remote form once remoting is enabled.
    pub fn address(&self) -> Address {
        self.core.address()
    }

    /// The effective, layered configuration.
    pub fn config(&self) -> &Config {
        self.core.config()
    }

    /// Reference to the main actor at `/user`.
    pub fn user_ref(&self) -> ActorRef<M> {
        self.user.clone()
    }

    /// Non-generic handle for extensions and internals.
    pub fn system_ref(&self) -> SystemRef {
        SystemRef::new(Arc::clone(&self.core))
    }

    /// Route a message to the main actor.
    pub fn tell(&self, msg: M) {
        self.user.tell(msg);
    }

    /// Ask the main actor.
    pub fn ask<Resp: Message>(&self, msg: M, timeout: Duration) -> RuntimeFuture<Resp> {
        self.user.ask(msg, timeout)
    }

    /// Look up an actor by URI, local or remote.
    ///
    /// A URI addressing this system resolves through the path registry
    /// and yields a local ref; one addressing another system yields a
    /// transparent remote ref (remoting must be enabled first).
    pub fn actor_for<T: Message + Serialize>(&self, uri: &str) -> RtResult<ActorRef<T>> {
        let context_address = self.core.address();
        let path = ActorPath::resolve(uri, &context_address)?;
        if path.address().system() == self.core.name() {
            let entry = self
                .core
                .registry()
                .resolve_path(&path)
                .ok_or_else(|| RuntimeError::BadPath(format!("no actor registered at {uri}")))?;
            let sender = entry.typed::<T>().ok_or_else(|| {
                RuntimeError::BadPath(format!(
                    "actor at {uri} does not accept {}",
                    T::MESSAGE_TYPE
                ))
            })?;
            return Ok(ActorRef::local(
                entry.id,
                entry.path.clone(),
                sender,
                Arc::clone(&self.core),
            ));
        }
        if !path.address().is_remote() {
            return Err(RuntimeError::BadPath(format!(
                "{uri}: local address of a different system"
            )));
        }
        let remoting = self
            .core
            .remoting()
            .ok_or_else(|| RuntimeError::BadConfig("remoting is not enabled".to_string()))?;
        let pool = remoting.pool_for(path.address());
        Ok(ActorRef::remote(RemoteRef::new(
            path,
            pool,
            Arc::clone(&self.core),
        )))
    }

    /// The singleton extension for `id`, created on first call.
    pub async fn extension<I: ExtensionId>(&self, id: &I) -> RtResult<Arc<I::Ext>> {
        if !self.core.is_running() {
            return Err(RuntimeError::Shutdown);
        }
        self.core
            .extensions()
            .get_or_create(id, self.system_ref())
            .await
    }

    /// Start the remoting server and switch this system's address to its
    /// TCP form. Idempotent: later calls return the existing extension.
    ///
    /// Port 0 binds an OS-assigned port, readable via
    /// [`RemotingExtension::local_port`].
    pub async fn enable_remoting(
        &self,
        host: &str,
        port: u16,
    ) -> RtResult<Arc<RemotingExtension>> {
        self.core.set_remoting_bind(host.to_string(), port);
        self.extension(&RemotingExtensionId).await
    }

    /// Gracefully terminate: stop the guardian tree, fail pending asks
    /// with [`RuntimeError::Shutdown`], stop extensions in reverse
    /// creation order, then the scheduler and dispatchers.
    pub async fn shutdown(&self) -> RtResult<()> {
        if !self.core.begin_shutdown() {
            return Err(RuntimeError::Shutdown);
        }
        debug!(system = self.core.name(), "shutdown requested");

        if let Some(root) = self.core.root_tx() {
            let _ = root.send(SystemSignal::Stop);
        }
        let limit = self
            .core
            .config()
            .get_duration_or("system.shutdown-timeout", Duration::from_secs(30))?;
        if tokio::time::timeout(limit, self.core.await_root_terminated())
            .await
            .is_err()
        {
            warn!(system = self.core.name(), ?limit, "actor tree did not stop in time");
        }

        self.core.fail_pending_asks(RuntimeError::Shutdown);
        self.core.extensions().stop_all();
        self.core.scheduler().shutdown();
        self.core.dispatchers().shutdown();
        self.core.mark_stopped();
        debug!(system = self.core.name(), "actor system stopped");
        Ok(())
    }
}
