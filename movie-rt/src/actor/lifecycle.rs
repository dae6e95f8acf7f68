//! Actor lifecycle state machine.
//!
//! Transitions are monotonic except through restart, which re-enters
//! `Starting` after `Stopped` and bumps the restart counter.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
// (none)

/// Actor state in the lifecycle state machine.
///
/// ```text
/// Created -> Starting -> Running -> Stopping -> Stopped -> Terminated
///                ^                                  |
///                +----------- restart --------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Allocated but not yet initializing.
    Created,

    /// Setup in progress (initial or after restart).
    Starting,

    /// Processing messages.
    Running,

    /// Stop delivered to children; waiting for their termination.
    Stopping,

    /// Children gone, cleanup done; termination not yet acknowledged.
    Stopped,

    /// Fully gone; the path registry entry has been removed.
    Terminated,
}

impl Default for ActorState {
    fn default() -> Self {
        Self::Created
    }
}

/// Lifecycle tracker: current state, last transition time, restart count.
#[derive(Debug, Clone)]
pub struct ActorLifecycle {
    state: ActorState,
    last_state_change: DateTime<Utc>,
    restart_count: u32,
}

impl ActorLifecycle {
    /// Create a new tracker in `Created` state.
    pub fn new() -> Self {
        Self {
            state: ActorState::Created,
            last_state_change: Utc::now(),
            restart_count: 0,
        }
    }

    /// Transition to a new state, recording the timestamp.
    ///
    /// Entering `Starting` from anything but `Created` counts as a
    /// restart.
    pub fn transition_to(&mut self, new_state: ActorState) {
        if new_state == ActorState::Starting && self.state != ActorState::Created {
            self.restart_count += 1;
        }
        self.state = new_state;
        self.last_state_change = Utc::now();
    }

    /// The current state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Timestamp of the last transition.
    pub fn last_state_change(&self) -> DateTime<Utc> {
        self.last_state_change
    }

    /// How many times this actor has been restarted.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Whether the actor has fully terminated.
    pub fn is_terminal(&self) -> bool {
        self.state == ActorState::Terminated
    }

    /// Whether the actor is currently processing messages.
    pub fn is_running(&self) -> bool {
        self.state == ActorState::Running
    }
}

impl Default for ActorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_starts_created() {
        let lifecycle = ActorLifecycle::new();
        assert_eq!(lifecycle.state(), ActorState::Created);
        assert_eq!(lifecycle.restart_count(), 0);
        assert!(!lifecycle.is_terminal());
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_normal_progression() {
        let mut lifecycle = ActorLifecycle::new();
        for state in [
            ActorState::Starting,
            ActorState::Running,
            ActorState::Stopping,
            ActorState::Stopped,
            ActorState::Terminated,
        ] {
            lifecycle.transition_to(state);
            assert_eq!(lifecycle.state(), state);
        }
        assert!(lifecycle.is_terminal());
        assert_eq!(lifecycle.restart_count(), 0);
    }

    #[test]
    fn test_restart_counts() {
        let mut lifecycle = ActorLifecycle::new();
        lifecycle.transition_to(ActorState::Starting); // initial, not a restart
        lifecycle.transition_to(ActorState::Running);
        assert_eq!(lifecycle.restart_count(), 0);

        lifecycle.transition_to(ActorState::Stopped);
        lifecycle.transition_to(ActorState::Starting); // restart
        assert_eq!(lifecycle.restart_count(), 1);

        lifecycle.transition_to(ActorState::Running);
        lifecycle.transition_to(ActorState::Starting); // another restart
        assert_eq!(lifecycle.restart_count(), 2);
    }

    #[test]
    fn test_is_running() {
        let mut lifecycle = ActorLifecycle::new();
        lifecycle.transition_to(ActorState::Starting);
        assert!(!lifecycle.is_running());
        lifecycle.transition_to(ActorState::Running);
        assert!(lifecycle.is_running());
        lifecycle.transition_to(ActorState::Stopping);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_timestamp_updates() {
        let mut lifecycle = ActorLifecycle::new();
        let first = lifecycle.last_state_change();
        std::thread::sleep(std::time::Duration::from_millis(10));
        lifecycle.transition_to(ActorState::Starting);
        assert!(lifecycle.last_state_change() > first);
    }
}
