// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Opaque identity of one actor.
///
/// Refs compare by (actor id, system) and the path registry keys its
/// reverse direction by it. Ids are never reused: a restarted actor
/// keeps its id, a respawned one under the same path gets a fresh one,
/// which is what lets a late unregister tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // compact form; ids only ever show up in log lines
        write!(f, "{}", self.0.simple())
    }
}

/// Pairs an `ASK_REQUEST` with its `ASK_RESPONSE`.
///
/// Travels in the envelope's `correlation_id` field (serialized as a
/// UUID string) and indexes the pending-ask tables on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Allocate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Hyphen-free hex form, safe inside a path element. Names the
    /// anonymous asker under `/temp`.
    pub fn short(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
