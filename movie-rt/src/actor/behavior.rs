//! Behaviors: how an actor processes one message.
//!
//! A [`Behavior`] is a cloneable value wrapping the handler function.
//! Processing a message yields a [`Transition`]: keep the current
//! behavior, stop, or become a new one. State lives in the closures and
//! moves forward through `Become`, so a restart can always re-run the
//! initial behavior exactly as spawned.
//!
//! ```rust
//! use movie_rt::actor::{Behavior, Transition};
//!
//! #[derive(Debug, Clone)]
//! struct Tick;
//! impl movie_rt::message::Message for Tick {
//!     const MESSAGE_TYPE: &'static str = "tick";
//! }
//!
//! fn counting(seen: u64) -> Behavior<Tick> {
//!     Behavior::receive(move |_ctx, _msg: Tick| {
//!         Ok(Transition::Become(counting(seen + 1)))
//!     })
//! }
//!
//! let initial = counting(0);
//! ```

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::context::ActorContext;
use crate::error::RtResult;
use crate::message::Message;

pub(crate) type ReceiveFn<M> =
    Arc<dyn Fn(&mut ActorContext<M>, M) -> RtResult<Transition<M>> + Send + Sync>;

pub(crate) type SetupFn<M> = Arc<dyn Fn(&mut ActorContext<M>) -> RtResult<Behavior<M>> + Send + Sync>;

/// Result of processing one message.
pub enum Transition<M: Message> {
    /// Keep the current behavior.
    Same,
    /// Begin the stopping sequence.
    Stopped,
    /// Replace the current behavior.
    Become(Behavior<M>),
}

impl<M: Message> fmt::Debug for Transition<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same => write!(f, "Same"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Become(_) => write!(f, "Become(..)"),
        }
    }
}

/// The handler an actor runs for each message.
pub struct Behavior<M: Message> {
    pub(crate) inner: BehaviorInner<M>,
}

pub(crate) enum BehaviorInner<M: Message> {
    Receive(ReceiveFn<M>),
    Setup(SetupFn<M>),
}

impl<M: Message> Clone for Behavior<M> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            BehaviorInner::Receive(f) => BehaviorInner::Receive(Arc::clone(f)),
            BehaviorInner::Setup(f) => BehaviorInner::Setup(Arc::clone(f)),
        };
        Self { inner }
    }
}

impl<M: Message> Behavior<M> {
    /// A behavior processing messages with `f`.
    ///
    /// Returning an error is the failure path: the kernel converts it into
    /// a supervision event for the parent.
    pub fn receive(
        f: impl Fn(&mut ActorContext<M>, M) -> RtResult<Transition<M>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: BehaviorInner::Receive(Arc::new(f)),
        }
    }

    /// A behavior produced by a one-time initializer with context access.
    ///
    /// `f` runs at start and again after every restart, which is what
    /// makes per-actor initialization restartable.
    pub fn setup(
        f: impl Fn(&mut ActorContext<M>) -> RtResult<Behavior<M>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: BehaviorInner::Setup(Arc::new(f)),
        }
    }

    /// A behavior that ignores every message.
    pub fn ignore() -> Self {
        Self::receive(|_ctx, _msg| Ok(Transition::Same))
    }

    pub(crate) fn receive_fn(&self) -> Option<ReceiveFn<M>> {
        match &self.inner {
            BehaviorInner::Receive(f) => Some(Arc::clone(f)),
            BehaviorInner::Setup(_) => None,
        }
    }

    pub(crate) fn setup_fn(&self) -> Option<SetupFn<M>> {
        match &self.inner {
            BehaviorInner::Setup(f) => Some(Arc::clone(f)),
            BehaviorInner::Receive(_) => None,
        }
    }
}

impl<M: Message> fmt::Debug for Behavior<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            BehaviorInner::Receive(_) => write!(f, "Behavior::Receive"),
            BehaviorInner::Setup(_) => write!(f, "Behavior::Setup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Ping;

    impl Message for Ping {
        const MESSAGE_TYPE: &'static str = "behavior_test_ping";
    }

    #[test]
    fn test_receive_behavior_shape() {
        let behavior: Behavior<Ping> = Behavior::receive(|_ctx, _msg| Ok(Transition::Same));
        assert!(behavior.receive_fn().is_some());
        assert!(behavior.setup_fn().is_none());
    }

    #[test]
    fn test_setup_behavior_shape() {
        let behavior: Behavior<Ping> = Behavior::setup(|_ctx| Ok(Behavior::ignore()));
        assert!(behavior.setup_fn().is_some());
        assert!(behavior.receive_fn().is_none());
    }

    #[test]
    fn test_clone_shares_handler() {
        let behavior: Behavior<Ping> = Behavior::ignore();
        let cloned = behavior.clone();
        assert!(cloned.receive_fn().is_some());
    }

    #[test]
    fn test_debug_output() {
        let behavior: Behavior<Ping> = Behavior::ignore();
        assert_eq!(format!("{behavior:?}"), "Behavior::Receive");
        let behavior: Behavior<Ping> = Behavior::setup(|_ctx| Ok(Behavior::ignore()));
        assert_eq!(format!("{behavior:?}"), "Behavior::Setup");
    }
}
