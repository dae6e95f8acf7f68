//! The actor kernel: behaviors, references, context, lifecycle,
//! supervision and the per-actor cell loop.

pub mod behavior;
pub(crate) mod cell;
pub mod context;
pub mod lifecycle;
pub mod refs;
pub(crate) mod signal;
pub mod supervision;

pub use behavior::{Behavior, Transition};
pub use context::{ActorContext, SpawnOptions};
pub use lifecycle::{ActorLifecycle, ActorState};
pub use refs::{ActorRef, ReplyTo};
pub use supervision::{Backoff, SupervisionConfig, SupervisorStrategy};
