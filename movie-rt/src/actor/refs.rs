//! Typed actor references.
//!
//! An [`ActorRef`] is a cheap-to-clone handle identified by (actor id,
//! system). It comes in two structurally different but behaviorally
//! identical flavors: local (direct mailbox enqueue) and remote
//! (serialize + striped pool send). Calling code cannot tell them apart;
//! that is the location transparency the remoting layer builds on.

// Layer 1: Standard library imports
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::signal::SystemSignal;
use crate::error::RuntimeError;
use crate::future::{Promise, RuntimeFuture};
use crate::mailbox::{MailboxSender, UserEnvelope};
use crate::message::{AnyMessage, Message, MessageRegistry};
use crate::path::ActorPath;
use crate::remote::envelope::WireEnvelope;
use crate::remote::remote_ref::RemoteRef;
use crate::system::core::SystemCore;
use crate::util::{ActorId, CorrelationId};

/// Handle to the sender of the message currently being processed.
///
/// Delivered alongside ask messages so the receiving behavior can answer
/// with [`ActorContext::reply_if_asked`](super::ActorContext::reply_if_asked).
/// Works identically whether the asker sits in this process (a promise is
/// completed) or across the wire (an `ASK_RESPONSE` envelope goes back on
/// the connection that carried the request).
#[derive(Clone)]
pub struct ReplyTo {
    path: Option<ActorPath>,
    inner: ReplyToInner,
}

#[derive(Clone)]
enum ReplyToInner {
    Promise(Arc<dyn Fn(AnyMessage) -> bool + Send + Sync>),
    Remote {
        correlation_id: CorrelationId,
        target: String,
        tx: tokio::sync::mpsc::Sender<WireEnvelope>,
    },
}

impl ReplyTo {
    pub(crate) fn promise(
        path: ActorPath,
        deliver: Arc<dyn Fn(AnyMessage) -> bool + Send + Sync>,
    ) -> Self {
        Self {
            path: Some(path),
            inner: ReplyToInner::Promise(deliver),
        }
    }

    pub(crate) fn remote(
        path: Option<ActorPath>,
        target: String,
        correlation_id: CorrelationId,
        tx: tokio::sync::mpsc::Sender<WireEnvelope>,
    ) -> Self {
        Self {
            path,
            inner: ReplyToInner::Remote {
                correlation_id,
                target,
                tx,
            },
        }
    }

    /// Path of the asker, when known.
    pub fn path(&self) -> Option<&ActorPath> {
        self.path.as_ref()
    }

    /// Answer the ask. Returns whether the reply was accepted.
    pub fn reply<T: Message + Serialize>(&self, value: T) -> bool {
        match &self.inner {
            ReplyToInner::Promise(deliver) => deliver(AnyMessage::new(value)),
            ReplyToInner::Remote {
                correlation_id,
                target,
                tx,
            } => {
                let (tag, payload) = match MessageRegistry::global().serialize(&value) {
                    Ok(encoded) => encoded,
                    Err(error) => {
                        warn!(%error, "dropping ask reply that does not serialize");
                        return false;
                    }
                };
                let envelope =
                    WireEnvelope::ask_response(target.clone(), tag, payload, *correlation_id);
                if tx.try_send(envelope).is_err() {
                    warn!(target_path = %target, "dropping ask reply: connection queue unavailable");
                    return false;
                }
                true
            }
        }
    }
}

impl fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyTo").field("path", &self.path).finish()
    }
}

/// Typed handle to an actor, local or remote.
pub struct ActorRef<M: Message> {
    pub(crate) variant: RefVariant<M>,
}

pub(crate) enum RefVariant<M: Message> {
    Local(LocalRef<M>),
    Remote(RemoteRef<M>),
}

/// Direct-enqueue reference to an actor in this system.
pub(crate) struct LocalRef<M: Message> {
    pub(crate) id: ActorId,
    pub(crate) path: ActorPath,
    pub(crate) sender: MailboxSender<M>,
    pub(crate) core: Arc<SystemCore>,
}

impl<M: Message> Clone for LocalRef<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            path: self.path.clone(),
            sender: self.sender.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

impl<M: Message> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        let variant = match &self.variant {
            RefVariant::Local(local) => RefVariant::Local(local.clone()),
            RefVariant::Remote(remote) => RefVariant::Remote(remote.clone()),
        };
        Self { variant }
    }
}

impl<M: Message> ActorRef<M> {
    pub(crate) fn local(
        id: ActorId,
        path: ActorPath,
        sender: MailboxSender<M>,
        core: Arc<SystemCore>,
    ) -> Self {
        Self {
            variant: RefVariant::Local(LocalRef {
                id,
                path,
                sender,
                core,
            }),
        }
    }

    pub(crate) fn remote(remote: RemoteRef<M>) -> Self {
        Self {
            variant: RefVariant::Remote(remote),
        }
    }

    /// The actor's path.
    pub fn path(&self) -> &ActorPath {
        match &self.variant {
            RefVariant::Local(local) => &local.path,
            RefVariant::Remote(remote) => remote.path(),
        }
    }

    /// Whether the target lives in this process.
    pub fn is_local(&self) -> bool {
        matches!(self.variant, RefVariant::Local(_))
    }

    /// Fire-and-forget send. At-most-once: a full mailbox or an
    /// unavailable link drops the message (counted, never surfaced).
    pub fn tell(&self, msg: M) {
        self.tell_with_sender(msg, None);
    }

    pub(crate) fn tell_with_sender(&self, msg: M, sender: Option<ReplyTo>) {
        match &self.variant {
            RefVariant::Local(local) => {
                local.sender.try_send_user(UserEnvelope { msg, sender });
            }
            RefVariant::Remote(remote) => remote.tell_with_sender(msg, sender),
        }
    }

    /// Request/response: send `msg` carrying an anonymous asker and
    /// return the future reply of type `Resp`.
    ///
    /// The future fails with [`RuntimeError::AskTimeout`] when no reply
    /// arrives within `timeout`, and with [`RuntimeError::Shutdown`] if
    /// the system terminates first.
    pub fn ask<Resp: Message>(&self, msg: M, timeout: Duration) -> RuntimeFuture<Resp> {
        match &self.variant {
            RefVariant::Local(local) => local_ask(&local.core, &local.sender, msg, timeout),
            RefVariant::Remote(remote) => remote.ask(msg, timeout),
        }
    }

    /// Ask the target to stop (system lane; precedes queued user messages).
    pub fn stop(&self) {
        match &self.variant {
            RefVariant::Local(local) => local.sender.send_system(SystemSignal::Stop),
            RefVariant::Remote(remote) => remote.send_stop(),
        }
    }
}

impl<M: Message> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.variant, &other.variant) {
            (RefVariant::Local(a), RefVariant::Local(b)) => {
                a.id == b.id && a.core.name() == b.core.name()
            }
            (RefVariant::Remote(a), RefVariant::Remote(b)) => a.path() == b.path(),
            _ => false,
        }
    }
}

impl<M: Message> Eq for ActorRef<M> {}

impl<M: Message> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.path())
    }
}

/// Type-erased reference held by the path registry.
///
/// Carries a boxed delivery function that downcasts to the concrete
/// message type, plus the typed sender for recovery via
/// [`DynActorRef::typed`].
#[derive(Clone)]
pub(crate) struct DynActorRef {
    pub(crate) id: ActorId,
    pub(crate) path: ActorPath,
    system: UnboundedSender<SystemSignal>,
    deliver: Arc<dyn Fn(AnyMessage, Option<ReplyTo>) -> crate::error::RtResult<()> + Send + Sync>,
    typed_sender: Arc<dyn Any + Send + Sync>,
}

impl DynActorRef {
    pub(crate) fn new<M: Message>(id: ActorId, path: ActorPath, sender: MailboxSender<M>) -> Self {
        let deliver_sender = sender.clone();
        Self {
            id,
            path,
            system: sender.system_sender(),
            deliver: Arc::new(move |any, reply| match any.downcast::<M>() {
                Ok(msg) => {
                    deliver_sender.try_send_user(UserEnvelope { msg, sender: reply });
                    Ok(())
                }
                Err(other) => Err(RuntimeError::UnknownMessageType(format!(
                    "{} (target expects {})",
                    other.tag(),
                    M::MESSAGE_TYPE
                ))),
            }),
            typed_sender: Arc::new(sender),
        }
    }

    /// Deliver a decoded message; fails when the payload type does not
    /// match the target's message type.
    pub(crate) fn deliver(
        &self,
        any: AnyMessage,
        reply: Option<ReplyTo>,
    ) -> crate::error::RtResult<()> {
        (self.deliver)(any, reply)
    }

    pub(crate) fn send_system(&self, signal: SystemSignal) {
        let _ = self.system.send(signal);
    }

    /// Recover the typed sender, if `M` is the actor's message type.
    pub(crate) fn typed<M: Message>(&self) -> Option<MailboxSender<M>> {
        Arc::clone(&self.typed_sender)
            .downcast::<MailboxSender<M>>()
            .ok()
            .map(|sender| (*sender).clone())
    }
}

impl fmt::Debug for DynActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynActorRef({})", self.path)
    }
}

/// Local ask: an anonymous promise-backed asker accepts exactly one reply.
pub(crate) fn local_ask<M: Message, Resp: Message>(
    core: &Arc<SystemCore>,
    sender: &MailboxSender<M>,
    msg: M,
    timeout: Duration,
) -> RuntimeFuture<Resp> {
    let promise: Promise<Resp> = Promise::new();
    let future = promise.future();
    let correlation_id = CorrelationId::new();
    let asker_path = core.temp_ask_path(correlation_id);

    let deliver = {
        let promise = promise.clone();
        Arc::new(move |any: AnyMessage| match any.downcast::<Resp>() {
            Ok(value) => promise.try_success(value),
            Err(other) => promise.try_failure(RuntimeError::AskFailed(format!(
                "unexpected reply type {:?}",
                other.tag()
            ))),
        }) as Arc<dyn Fn(AnyMessage) -> bool + Send + Sync>
    };

    core.track_pending_ask(correlation_id, &promise, &future);

    let timer = core.scheduler().schedule_once(timeout, {
        let promise = promise.clone();
        move || {
            if promise.try_failure(RuntimeError::AskTimeout(timeout)) {
                debug!(timeout = ?timeout, "ask timed out");
            }
        }
    });
    {
        let timer = timer.clone();
        future.on_success(move |_| timer.cancel());
    }
    {
        let timer = timer.clone();
        future.on_failure(move |_| timer.cancel());
    }
    {
        let timer = timer.clone();
        future.on_cancel(move || timer.cancel());
    }

    let reply_to = ReplyTo::promise(asker_path, deliver);
    sender.try_send_user(UserEnvelope {
        msg,
        sender: Some(reply_to),
    });
    future
}
