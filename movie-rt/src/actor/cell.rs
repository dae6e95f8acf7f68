//! The actor cell: one cooperative task per actor.
//!
//! The cell owns the mailbox, the current behavior, the lifecycle tracker
//! and the children table. One step drains ready system signals, then
//! processes at most one user message; behaviors run to completion, so
//! fairness across actors sharing a dispatcher depends on them staying
//! non-blocking.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

// Layer 3: Internal module imports
use super::behavior::{Behavior, Transition};
use super::context::ActorContext;
use super::lifecycle::{ActorLifecycle, ActorState};
use super::refs::{ActorRef, DynActorRef, ReplyTo};
use super::signal::SystemSignal;
use super::supervision::{RestartWindow, SupervisionConfig, SupervisorStrategy};
use crate::error::{RtResult, RuntimeError};
use crate::mailbox::{self, Mailbox, MailboxItem, MailboxSender, UserEnvelope};
use crate::message::Message;
use crate::path::ActorPath;
use crate::scheduler::TimerHandle;
use crate::system::core::SystemCore;
use crate::system::dispatcher::Dispatcher;
use crate::util::ActorId;

/// Supervision bookkeeping the parent keeps per child.
pub(crate) struct ChildRecord {
    pub(crate) name: String,
    pub(crate) system_tx: UnboundedSender<SystemSignal>,
    pub(crate) supervision: SupervisionConfig,
    pub(crate) window: RestartWindow,
}

#[derive(Default)]
pub(crate) struct ChildTable {
    pub(crate) by_id: HashMap<ActorId, ChildRecord>,
    pub(crate) by_name: HashMap<String, ActorId>,
}

/// Cell state shared between the cell task and its contexts.
///
/// Mutation happens almost exclusively inside the cell's own task; the
/// locks exist because contexts hold an `Arc` rather than a borrow.
pub(crate) struct CellState {
    pub(crate) id: ActorId,
    pub(crate) path: ActorPath,
    pub(crate) system_tx: UnboundedSender<SystemSignal>,
    pub(crate) children: Mutex<ChildTable>,
    pub(crate) timers: Mutex<Vec<TimerHandle>>,
    pub(crate) anon_seq: AtomicU64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// Failed; awaiting the parent's supervision decision.
    Suspended,
    Stopping,
    Restarting,
    Terminated,
}

pub(crate) struct ActorCell<M: Message> {
    core: Arc<SystemCore>,
    state: Arc<CellState>,
    mailbox: Mailbox<M>,
    self_sender: MailboxSender<M>,
    parent_tx: Option<UnboundedSender<SystemSignal>>,
    initial: Behavior<M>,
    current: Behavior<M>,
    lifecycle: ActorLifecycle,
    phase: Phase,
}

/// Allocate a child cell under `parent` and start it on `dispatcher`.
///
/// Registers the child in the path registry and in the parent's children
/// table; the returned ref is immediately usable.
pub(crate) fn spawn_child<C: Message>(
    core: &Arc<SystemCore>,
    parent: &Arc<CellState>,
    behavior: Behavior<C>,
    supervision: SupervisionConfig,
    name: Option<&str>,
    dispatcher: Dispatcher,
) -> RtResult<ActorRef<C>> {
    let name = match name {
        Some(given) => given.to_string(),
        None => format!("${}", parent.anon_seq.fetch_add(1, Ordering::Relaxed)),
    };
    let path = parent.path.child(&name)?;

    let mut table = parent.children.lock();
    if table.by_name.contains_key(&name) {
        return Err(RuntimeError::BadPath(format!(
            "child name not unique under {}: {name:?}",
            parent.path
        )));
    }

    let id = ActorId::new();
    let (mailbox, sender) = mailbox::channel::<C>(core.mailbox_capacity(), &path.path_str());
    let state = Arc::new(CellState {
        id,
        path: path.clone(),
        system_tx: sender.system_sender(),
        children: Mutex::new(ChildTable::default()),
        timers: Mutex::new(Vec::new()),
        anon_seq: AtomicU64::new(0),
    });

    table.by_name.insert(name.clone(), id);
    table.by_id.insert(
        id,
        ChildRecord {
            name,
            system_tx: sender.system_sender(),
            supervision: supervision.clone(),
            window: RestartWindow::new(supervision.within),
        },
    );
    drop(table);

    core.registry()
        .register(DynActorRef::new(id, path.clone(), sender.clone()));

    let cell = ActorCell {
        core: Arc::clone(core),
        state,
        mailbox,
        self_sender: sender.clone(),
        parent_tx: Some(parent.system_tx.clone()),
        initial: behavior.clone(),
        current: behavior,
        lifecycle: ActorLifecycle::new(),
        phase: Phase::Running,
    };
    core.dispatchers().spawn(dispatcher, cell.run());

    Ok(ActorRef::local(id, path, sender, Arc::clone(core)))
}

/// Build the root guardian cell. The caller spawns the well-known
/// children against the returned state before running the cell.
pub(crate) fn make_root<M: Message>(
    core: &Arc<SystemCore>,
    behavior: Behavior<M>,
) -> (Arc<CellState>, ActorCell<M>) {
    let path = ActorPath::root(core.address());
    let (mailbox, sender) = mailbox::channel::<M>(core.mailbox_capacity(), "/");
    let state = Arc::new(CellState {
        id: ActorId::new(),
        path: path.clone(),
        system_tx: sender.system_sender(),
        children: Mutex::new(ChildTable::default()),
        timers: Mutex::new(Vec::new()),
        anon_seq: AtomicU64::new(0),
    });
    core.registry()
        .register(DynActorRef::new(state.id, path, sender.clone()));
    let cell = ActorCell {
        core: Arc::clone(core),
        state: Arc::clone(&state),
        mailbox,
        self_sender: sender,
        parent_tx: None,
        initial: behavior.clone(),
        current: behavior,
        lifecycle: ActorLifecycle::new(),
        phase: Phase::Running,
    };
    (state, cell)
}

impl<M: Message> ActorCell<M> {
    pub(crate) async fn run(mut self) {
        self.lifecycle.transition_to(ActorState::Starting);
        if self.initialize() {
            self.lifecycle.transition_to(ActorState::Running);
            self.phase = Phase::Running;
        }
        loop {
            match self.phase {
                Phase::Terminated => break,
                Phase::Running => match self.mailbox.next().await {
                    MailboxItem::System(signal) => self.handle_system(signal),
                    MailboxItem::User(envelope) => self.handle_user(envelope),
                    MailboxItem::Closed => self.begin_stop(),
                },
                // Suspended, stopping and restarting actors only react to
                // the system lane; queued user messages wait (or are
                // cleared by the restart).
                _ => match self.mailbox.next_system().await {
                    Some(signal) => self.handle_system(signal),
                    None => self.finalize(),
                },
            }
        }
    }

    fn context(&self, sender: Option<ReplyTo>) -> ActorContext<M> {
        ActorContext {
            core: Arc::clone(&self.core),
            cell: Arc::clone(&self.state),
            self_ref: ActorRef::local(
                self.state.id,
                self.state.path.clone(),
                self.self_sender.clone(),
                Arc::clone(&self.core),
            ),
            sender,
        }
    }

    /// Run setup behaviors until a receive behavior is installed.
    fn initialize(&mut self) -> bool {
        loop {
            let Some(setup) = self.current.setup_fn() else {
                return true;
            };
            let mut ctx = self.context(None);
            match setup(&mut ctx) {
                Ok(next) => self.current = next,
                Err(error) => {
                    self.report_failure(error);
                    return false;
                }
            }
        }
    }

    fn handle_user(&mut self, envelope: UserEnvelope<M>) {
        let Some(receive) = self.current.receive_fn() else {
            return;
        };
        let mut ctx = self.context(envelope.sender);
        match receive(&mut ctx, envelope.msg) {
            Ok(Transition::Same) => {}
            Ok(Transition::Become(next)) => self.current = next,
            Ok(Transition::Stopped) => self.begin_stop(),
            Err(error) => self.report_failure(error),
        }
    }

    fn handle_system(&mut self, signal: SystemSignal) {
        match signal {
            SystemSignal::Stop => self.begin_stop(),
            SystemSignal::Restart => self.begin_restart(),
            SystemSignal::SpawnChild(spawn) => {
                if matches!(self.phase, Phase::Running | Phase::Suspended) {
                    spawn(&self.core, &self.state);
                }
            }
            SystemSignal::ChildFailed { id, name, error } => self.on_child_failed(id, name, error),
            SystemSignal::ChildTerminated { id, name } => self.on_child_terminated(id, name),
        }
    }

    /// A behavior error: suspend and hand the decision to the parent.
    fn report_failure(&mut self, error: RuntimeError) {
        match &self.parent_tx {
            Some(parent) => {
                warn!(path = %self.state.path, %error, "behavior failed, awaiting supervision");
                self.phase = Phase::Suspended;
                let _ = parent.send(SystemSignal::ChildFailed {
                    id: self.state.id,
                    name: self.state.path.name().to_string(),
                    error,
                });
            }
            None => {
                error!(path = %self.state.path, %error, "root guardian failure, stopping tree");
                self.begin_stop();
            }
        }
    }

    fn on_child_failed(&mut self, id: ActorId, name: String, error: RuntimeError) {
        enum Decision {
            StopChild(UnboundedSender<SystemSignal>),
            RestartChild(UnboundedSender<SystemSignal>, Duration),
            Escalate,
        }

        let decision = {
            let mut table = self.state.children.lock();
            let Some(record) = table.by_id.get_mut(&id) else {
                debug!(child = %name, "failure from unknown child ignored");
                return;
            };
            match record.supervision.strategy {
                SupervisorStrategy::Stop => Decision::StopChild(record.system_tx.clone()),
                SupervisorStrategy::Escalate => Decision::Escalate,
                SupervisorStrategy::Restart => {
                    let n = record.window.record();
                    if n <= record.supervision.max_restarts {
                        let delay = record.supervision.backoff.delay_for(n - 1);
                        Decision::RestartChild(record.system_tx.clone(), delay)
                    } else {
                        // the (k+1)-th failure inside the window
                        Decision::Escalate
                    }
                }
            }
        };

        match decision {
            Decision::StopChild(tx) => {
                debug!(parent = %self.state.path, child = %name, "stopping failed child");
                let _ = tx.send(SystemSignal::Stop);
            }
            Decision::RestartChild(tx, delay) => {
                debug!(parent = %self.state.path, child = %name, ?delay, "scheduling child restart");
                self.core.scheduler().schedule_once(delay, move || {
                    let _ = tx.send(SystemSignal::Restart);
                });
            }
            Decision::Escalate => self.escalate(name, error),
        }
    }

    fn escalate(&mut self, child: String, error: RuntimeError) {
        match &self.parent_tx {
            Some(parent) => {
                debug!(path = %self.state.path, child = %child, "escalating child failure");
                self.phase = Phase::Suspended;
                let _ = parent.send(SystemSignal::ChildFailed {
                    id: self.state.id,
                    name: self.state.path.name().to_string(),
                    error,
                });
            }
            None => {
                // Root guardian strategy is effectively stop: an
                // escalation nobody handled brings the tree down.
                error!(child = %child, %error, "escalation reached the root guardian, shutting down");
                self.begin_stop();
            }
        }
    }

    fn on_child_terminated(&mut self, id: ActorId, name: String) {
        let empty = {
            let mut table = self.state.children.lock();
            table.by_id.remove(&id);
            if table.by_name.get(&name) == Some(&id) {
                table.by_name.remove(&name);
            }
            table.by_id.is_empty()
        };
        match self.phase {
            Phase::Stopping if empty => self.finalize(),
            Phase::Restarting if empty => self.perform_restart(),
            _ => {}
        }
    }

    /// Deliver stop to children, await their termination, then finalize.
    fn begin_stop(&mut self) {
        if matches!(self.phase, Phase::Stopping | Phase::Terminated) {
            return;
        }
        self.phase = Phase::Stopping;
        self.lifecycle.transition_to(ActorState::Stopping);
        let children: Vec<_> = {
            let table = self.state.children.lock();
            table.by_id.values().map(|r| r.system_tx.clone()).collect()
        };
        if children.is_empty() {
            self.finalize();
            return;
        }
        for tx in children {
            let _ = tx.send(SystemSignal::Stop);
        }
    }

    /// Restart: clear the user lane, stop children, then re-run setup.
    fn begin_restart(&mut self) {
        if matches!(
            self.phase,
            Phase::Stopping | Phase::Terminated | Phase::Restarting
        ) {
            return;
        }
        debug!(path = %self.state.path, "restart requested");
        self.phase = Phase::Restarting;
        self.lifecycle.transition_to(ActorState::Stopping);
        let cleared = self.mailbox.drain_user();
        if cleared > 0 {
            debug!(path = %self.state.path, cleared, "cleared user lane for restart");
        }
        let children: Vec<_> = {
            let table = self.state.children.lock();
            table.by_id.values().map(|r| r.system_tx.clone()).collect()
        };
        if children.is_empty() {
            self.perform_restart();
            return;
        }
        for tx in children {
            let _ = tx.send(SystemSignal::Stop);
        }
    }

    fn perform_restart(&mut self) {
        self.lifecycle.transition_to(ActorState::Stopped);
        self.cancel_timers();
        self.mailbox.drain_user();
        self.lifecycle.transition_to(ActorState::Starting);
        self.current = self.initial.clone();
        if self.initialize() {
            self.phase = Phase::Running;
            self.lifecycle.transition_to(ActorState::Running);
            debug!(path = %self.state.path, restarts = self.lifecycle.restart_count(), "restarted");
        }
    }

    fn finalize(&mut self) {
        if matches!(self.phase, Phase::Terminated) {
            return;
        }
        self.cancel_timers();
        self.core.registry().unregister(&self.state.id);
        self.lifecycle.transition_to(ActorState::Stopped);
        match &self.parent_tx {
            Some(parent) => {
                let _ = parent.send(SystemSignal::ChildTerminated {
                    id: self.state.id,
                    name: self.state.path.name().to_string(),
                });
            }
            None => self.core.mark_root_terminated(),
        }
        self.lifecycle.transition_to(ActorState::Terminated);
        self.phase = Phase::Terminated;
        debug!(
            path = %self.state.path,
            restarts = self.lifecycle.restart_count(),
            dropped = self.self_sender.dropped_count(),
            "terminated"
        );
    }

    fn cancel_timers(&self) {
        for timer in self.state.timers.lock().drain(..) {
            timer.cancel();
        }
    }
}
