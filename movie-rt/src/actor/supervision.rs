//! Supervision policy and restart bookkeeping.
//!
//! A parent reacts to a child's failure according to the
//! [`SupervisionConfig`] captured when the child was spawned: restart
//! with exponential backoff inside a sliding window, stop, or escalate
//! to its own parent. The window keeps restart storms bounded: the
//! `(max_restarts + 1)`-th failure inside `within` escalates.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use crate::config::Config;
use crate::error::{RtResult, RuntimeError};

/// How a parent reacts to a failed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStrategy {
    /// Re-run the child's setup after a backoff delay.
    Restart,
    /// Terminate the child.
    Stop,
    /// Fail the parent itself, propagating to the grandparent.
    Escalate,
}

/// Exponential backoff parameters: `delay(k) = min(max, min * factor^k)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl Backoff {
    /// The delay before the `(k+1)`-th restart (`k` starts at zero).
    pub fn delay_for(&self, k: u32) -> Duration {
        // cap the exponent so the f64 multiply cannot overflow
        let exp = k.min(32);
        let scaled = self.min.as_millis() as f64 * self.factor.powi(exp as i32);
        let capped = scaled.min(self.max.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
        }
    }
}

/// Full supervision policy for one child.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisionConfig {
    pub strategy: SupervisorStrategy,
    pub max_restarts: u32,
    pub within: Duration,
    pub backoff: Backoff,
}

impl SupervisionConfig {
    /// Restart with the default window and backoff.
    pub fn restart() -> Self {
        Self {
            strategy: SupervisorStrategy::Restart,
            ..Self::default()
        }
    }

    /// Stop the child on failure.
    pub fn stop() -> Self {
        Self {
            strategy: SupervisorStrategy::Stop,
            ..Self::default()
        }
    }

    /// Escalate the failure to the grandparent.
    pub fn escalate() -> Self {
        Self {
            strategy: SupervisorStrategy::Escalate,
            ..Self::default()
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_window(mut self, within: Duration) -> Self {
        self.within = within;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Read the `supervision.*` section of a configuration.
    pub fn from_config(config: &Config) -> RtResult<Self> {
        let strategy = match config.get_string_or("supervision.strategy", "restart")?.as_str() {
            "restart" => SupervisorStrategy::Restart,
            "stop" => SupervisorStrategy::Stop,
            "escalate" => SupervisorStrategy::Escalate,
            other => {
                return Err(RuntimeError::BadConfig(format!(
                    "supervision.strategy: unknown strategy {other:?}"
                )))
            }
        };
        let defaults = Self::default();
        Ok(Self {
            strategy,
            max_restarts: config.get_int_or("supervision.max-restarts", 3)? as u32,
            within: config.get_duration_or("supervision.within", defaults.within)?,
            backoff: Backoff {
                min: config.get_duration_or("supervision.backoff.min", defaults.backoff.min)?,
                max: config.get_duration_or("supervision.backoff.max", defaults.backoff.max)?,
                factor: config.get_float_or("supervision.backoff.factor", defaults.backoff.factor)?,
            },
        })
    }
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            strategy: SupervisorStrategy::Restart,
            max_restarts: 3,
            within: Duration::from_secs(60),
            backoff: Backoff::default(),
        }
    }
}

/// Sliding window of restart timestamps (newest first).
///
/// Old restarts expire as time passes, so transient trouble does not lock
/// a child out forever.
#[derive(Debug, Clone)]
pub(crate) struct RestartWindow {
    within: Duration,
    history: VecDeque<DateTime<Utc>>,
}

impl RestartWindow {
    pub(crate) fn new(within: Duration) -> Self {
        Self {
            within,
            history: VecDeque::new(),
        }
    }

    /// Record a restart now and return the count inside the window,
    /// including this one.
    pub(crate) fn record(&mut self) -> u32 {
        self.prune();
        self.history.push_front(Utc::now());
        self.history.len() as u32
    }

    /// Restarts currently inside the window.
    #[allow(dead_code)] // exercised in tests
    pub(crate) fn count(&mut self) -> u32 {
        self.prune();
        self.history.len() as u32
    }

    fn prune(&mut self) {
        let Ok(window) = chrono::Duration::from_std(self.within) else {
            return; // duration too large to convert; keep everything
        };
        let cutoff = Utc::now() - window;
        while self.history.back().is_some_and(|t| *t < cutoff) {
            self.history.pop_back();
        }
    }
}
