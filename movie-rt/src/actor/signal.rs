//! Internal system-lane signals.
//!
//! These travel on the priority lane of every mailbox and drive lifecycle,
//! supervision and guardian-level spawning. They never cross the public
//! API surface.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::cell::CellState;
use crate::error::RuntimeError;
use crate::system::core::SystemCore;
use crate::util::ActorId;

/// Deferred spawn executed inside the target cell's loop, so the children
/// table is only ever touched from one task.
pub(crate) type SpawnFn = Box<dyn FnOnce(&Arc<SystemCore>, &Arc<CellState>) + Send>;

/// Priority-lane message.
pub(crate) enum SystemSignal {
    /// Begin the stopping sequence.
    Stop,
    /// Re-run the initial behavior's setup after a supervised failure.
    Restart,
    /// A child's behavior returned an error; the receiver decides.
    ChildFailed {
        id: ActorId,
        name: String,
        error: RuntimeError,
    },
    /// A child finished its stopping sequence.
    ChildTerminated { id: ActorId, name: String },
    /// Spawn a child under the receiving actor (guardian-level spawns).
    SpawnChild(SpawnFn),
}

impl fmt::Debug for SystemSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "Stop"),
            Self::Restart => write!(f, "Restart"),
            Self::ChildFailed { id, name, error } => f
                .debug_struct("ChildFailed")
                .field("id", id)
                .field("name", name)
                .field("error", &error.to_string())
                .finish(),
            Self::ChildTerminated { id, name } => f
                .debug_struct("ChildTerminated")
                .field("id", id)
                .field("name", name)
                .finish(),
            Self::SpawnChild(_) => write!(f, "SpawnChild(..)"),
        }
    }
}
