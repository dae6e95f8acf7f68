//! Execution context handed to behaviors.
//!
//! The context is the actor's window onto the kernel: its own ref and
//! path, child management, timers, the ask/pipe machinery, and the reply
//! channel for the message currently being processed.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::Serialize;
use tracing::debug;

// Layer 3: Internal module imports
use super::behavior::Behavior;
use super::cell::{spawn_child, CellState};
use super::refs::{ActorRef, RefVariant, ReplyTo};
use super::signal::SystemSignal;
use super::supervision::SupervisionConfig;
use crate::error::{RtResult, RuntimeError};
use crate::future::RuntimeFuture;
use crate::message::Message;
use crate::path::ActorPath;
use crate::scheduler::TimerHandle;
use crate::system::core::SystemCore;
use crate::system::dispatcher::Dispatcher;
use crate::system::SystemRef;
use crate::util::ActorId;

/// Options for [`ActorContext::spawn_with`].
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub name: Option<String>,
    pub supervision: SupervisionConfig,
    pub dispatcher: Dispatcher,
}

impl SpawnOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_supervision(mut self, supervision: SupervisionConfig) -> Self {
        self.supervision = supervision;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}

/// Per-message view of the kernel, passed to every behavior invocation.
pub struct ActorContext<M: Message> {
    pub(crate) core: Arc<SystemCore>,
    pub(crate) cell: Arc<CellState>,
    pub(crate) self_ref: ActorRef<M>,
    pub(crate) sender: Option<ReplyTo>,
}

impl<M: Message> ActorContext<M> {
    /// This actor's own reference.
    pub fn self_ref(&self) -> &ActorRef<M> {
        &self.self_ref
    }

    /// This actor's path.
    pub fn path(&self) -> &ActorPath {
        &self.cell.path
    }

    /// This actor's id.
    pub fn actor_id(&self) -> ActorId {
        self.cell.id
    }

    /// Handle to the owning system.
    pub fn system(&self) -> SystemRef {
        SystemRef::new(Arc::clone(&self.core))
    }

    /// Sender of the message currently being processed, if it carried one.
    pub fn sender(&self) -> Option<&ReplyTo> {
        self.sender.as_ref()
    }

    /// Answer the current message's asker, if there is one.
    ///
    /// Returns whether a reply was delivered; a plain `tell` has no asker
    /// and the call becomes a logged no-op.
    pub fn reply_if_asked<T: Message + Serialize>(&self, value: T) -> bool {
        match &self.sender {
            Some(reply_to) => reply_to.reply(value),
            None => {
                debug!(path = %self.cell.path, "reply_if_asked without an asker");
                false
            }
        }
    }

    /// Spawn a child actor under this one.
    ///
    /// Names must be unique among this actor's children; pass `None` for
    /// a generated stable name. The supervision config decides how *this*
    /// actor reacts when the child fails.
    pub fn spawn<C: Message>(
        &self,
        behavior: Behavior<C>,
        supervision: SupervisionConfig,
        name: Option<&str>,
    ) -> RtResult<ActorRef<C>> {
        spawn_child(
            &self.core,
            &self.cell,
            behavior,
            supervision,
            name,
            Dispatcher::Parallel,
        )
    }

    /// Spawn with explicit options (dispatcher assignment included).
    pub fn spawn_with<C: Message>(
        &self,
        behavior: Behavior<C>,
        options: SpawnOptions,
    ) -> RtResult<ActorRef<C>> {
        spawn_child(
            &self.core,
            &self.cell,
            behavior,
            options.supervision,
            options.name.as_deref(),
            options.dispatcher,
        )
    }

    /// Stop one of this actor's children.
    pub fn stop_child<C: Message>(&self, child: &ActorRef<C>) {
        if let RefVariant::Local(local) = &child.variant {
            let table = self.cell.children.lock();
            if let Some(record) = table.by_id.get(&local.id) {
                let _ = record.system_tx.send(SystemSignal::Stop);
                return;
            }
        }
        debug!(path = %child.path(), "stop_child: not a child of {}", self.cell.path);
    }

    /// Run `f` once after `delay`. The task is cancelled automatically
    /// when this actor stops.
    pub fn schedule_once(
        &self,
        delay: Duration,
        f: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        let handle = self.core.scheduler().schedule_once(delay, f);
        self.cell.timers.lock().push(handle.clone());
        handle
    }

    /// Run `f` after `initial`, then every `period`, until cancelled or
    /// this actor stops.
    pub fn schedule_repeat(
        &self,
        initial: Duration,
        period: Duration,
        f: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        let handle = self.core.scheduler().schedule_repeat(initial, period, f);
        self.cell.timers.lock().push(handle.clone());
        handle
    }

    /// Ask `target` and get the typed reply as a future.
    pub fn ask<Req: Message, Resp: Message>(
        &self,
        target: &ActorRef<Req>,
        msg: Req,
        timeout: Duration,
    ) -> RuntimeFuture<Resp> {
        target.ask(msg, timeout)
    }

    /// Project a future's outcome into `target`'s mailbox.
    ///
    /// The sanctioned way to continue after async work without blocking
    /// the actor loop: both outcomes are mapped into ordinary messages.
    pub fn pipe_to<T, C>(
        &self,
        future: &RuntimeFuture<T>,
        target: ActorRef<C>,
        on_success: impl FnOnce(T) -> C + Send + 'static,
        on_failure: impl FnOnce(RuntimeError) -> C + Send + 'static,
    ) where
        T: Clone + Send + 'static,
        C: Message,
    {
        let success_target = target.clone();
        future.on_success(move |value| success_target.tell(on_success(value)));
        future.on_failure(move |error| target.tell(on_failure(error)));
    }
}
