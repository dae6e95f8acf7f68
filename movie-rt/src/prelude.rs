//! Prelude module for convenient imports.
//!
//! Re-exports the types most programs need:
//!
//! ```rust
//! use movie_rt::prelude::*;
//! ```

// Core actor system
pub use crate::actor::{
    ActorContext, ActorRef, Behavior, SpawnOptions, SupervisionConfig, SupervisorStrategy,
    Transition,
};

// Messaging
pub use crate::message::{register_message, Message};

// Futures
pub use crate::future::RuntimeFuture;

// System
pub use crate::system::{ActorSystem, Dispatcher, SystemRef};

// Configuration
pub use crate::config::Config;

// Paths
pub use crate::path::{ActorPath, Address};

// Errors
pub use crate::error::{RtResult, RuntimeError};
