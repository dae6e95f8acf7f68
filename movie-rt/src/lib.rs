//! # movie-rt - Typed, Location-Transparent Actor Runtime
//!
//! An in-process actor kernel with supervision and typed references,
//! plus a remoting layer that makes those references usable across TCP
//! boundaries without changing the calling code.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use movie_rt::prelude::*;
//!
//! // 1. Define your message type
//! #[derive(Debug, Clone)]
//! enum CounterMsg {
//!     Increment,
//!     Query,
//! }
//!
//! impl Message for CounterMsg {
//!     const MESSAGE_TYPE: &'static str = "counter";
//! }
//!
//! // 2. Define a behavior; state moves forward through Become
//! fn counting(count: u64) -> Behavior<CounterMsg> {
//!     Behavior::receive(move |ctx, msg| match msg {
//!         CounterMsg::Increment => Ok(Transition::Become(counting(count + 1))),
//!         CounterMsg::Query => {
//!             ctx.reply_if_asked(count.to_string());
//!             Ok(Transition::Same)
//!         }
//!     })
//! }
//!
//! // 3. Start a system and talk to it
//! #[tokio::main]
//! async fn main() -> movie_rt::error::RtResult<()> {
//!     let system = ActorSystem::new("counter", counting(0), Config::empty())?;
//!
//!     system.tell(CounterMsg::Increment);
//!     let count: String = system
//!         .ask(CounterMsg::Query, std::time::Duration::from_secs(1))
//!         .await_result(None)
//!         .await?;
//!     assert_eq!(count, "1");
//!
//!     system.shutdown().await
//! }
//! ```
//!
//! # Core Concepts
//!
//! - **Behaviors over trait objects**: an actor is a [`Behavior`] value;
//!   processing a message yields a [`Transition`] (`Same`, `Stopped`, or
//!   `Become`). Handler errors feed supervision, never the sender.
//! - **Typed refs, dynamic wire**: an [`ActorRef<M>`](actor::ActorRef)
//!   is typed at compile time whether it points in-process or across
//!   TCP; at the wire boundary the [message
//!   registry](message::MessageRegistry) maps string tags back to
//!   concrete types. Register a type on both peers before sending it.
//! - **Supervision**: parents restart failing children with exponential
//!   backoff inside a sliding window, stop them, or escalate
//!   ([`SupervisionConfig`](actor::SupervisionConfig)).
//! - **At-most-once delivery**: full mailboxes and dead links drop
//!   messages (counted, logged, never duplicated). Per sender-receiver
//!   pair, delivered messages preserve send order, locally and remotely
//!   (consistent stripe routing pins a target path to one TCP stream).
//!
//! # Module Organization
//!
//! ## Core Actor System
//! - [`actor`] - behaviors, refs, context, lifecycle, supervision
//! - [`message`] - message trait and the global message registry
//! - [`system`] - the actor system, guardians and dispatchers
//!
//! ## Remoting
//! - [`remote`] - wire envelope, frame codec, connections, striped
//!   pools, the inbound server and remote refs
//!
//! ## Infrastructure
//! - [`config`] - layered configuration (defaults <- file <- env)
//! - [`scheduler`] - one-shot and periodic timers
//! - [`future`] - single-assignment promises for the ask pattern
//! - [`extension`] - lazily-created system-scoped singletons
//! - [`path`] - addresses and actor paths
//! - [`error`] - the crate-wide error type
//! - [`util`] - ids

pub mod actor;
pub mod config;
pub mod error;
pub mod extension;
pub mod future;
pub(crate) mod mailbox;
pub mod message;
pub mod path;
pub mod prelude;
pub(crate) mod registry;
pub mod remote;
pub mod scheduler;
pub mod system;
pub mod util;

// Re-export commonly used types
pub use actor::{
    ActorContext, ActorLifecycle, ActorRef, ActorState, Backoff, Behavior, ReplyTo, SpawnOptions,
    SupervisionConfig, SupervisorStrategy, Transition,
};
pub use config::{Config, ConfigValue};
pub use error::{RtResult, RuntimeError};
pub use extension::{Extension, ExtensionId};
pub use future::{Promise, RuntimeFuture};
pub use message::{register_message, Message, MessageRegistry};
pub use path::{ActorPath, Address};
pub use remote::{RemotingExtension, WireEnvelope};
pub use scheduler::{Scheduler, TimerHandle};
pub use system::{ActorSystem, Dispatcher, SystemRef};
