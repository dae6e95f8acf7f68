//! Timer facility for one-shot and periodic tasks.
//!
//! A dedicated worker task owns a min-heap keyed by monotonic due time
//! ([`tokio::time::Instant`], immune to wall-clock jumps). Due tasks are
//! submitted to the default dispatcher; the worker never runs user code
//! inline. Ask timeouts, supervision backoff and heartbeats all go through
//! here.
//!
//! ```rust,no_run
//! use movie_rt::scheduler::Scheduler;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let scheduler = Scheduler::new();
//! let handle = scheduler.schedule_once(Duration::from_millis(50), || {
//!     println!("fired");
//! });
//! handle.cancel(); // idempotent
//! # }
//! ```

// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::trace;

// Layer 3: Internal module imports
// (none)

type Task = Arc<dyn Fn() + Send + Sync>;

/// Cancellation handle returned by the scheduling methods.
///
/// `cancel` is idempotent; a cancelled task is skipped at fire time and,
/// for periodic tasks, never rescheduled.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Cancel the task. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}

enum Command {
    Schedule(Entry),
    Shutdown,
}

struct Entry {
    due: Instant,
    period: Option<Duration>,
    seq: u64,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: BinaryHeap is a max-heap, we want the earliest due time on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Handle to the timer worker. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    tx: UnboundedSender<Command>,
    seq: Arc<AtomicU64>,
}

impl Scheduler {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        tokio::spawn(worker(rx));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `task` once after `delay`.
    pub fn schedule_once(&self, delay: Duration, task: impl Fn() + Send + Sync + 'static) -> TimerHandle {
        self.schedule(delay, None, Arc::new(task))
    }

    /// Run `task` after `initial`, then every `period`.
    pub fn schedule_repeat(
        &self,
        initial: Duration,
        period: Duration,
        task: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        self.schedule(initial, Some(period), Arc::new(task))
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let entry = Entry {
            due: Instant::now() + delay,
            period,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            task,
            cancelled: Arc::clone(&cancelled),
        };
        // A closed worker means the system is shutting down; the task is
        // silently discarded, like a cancelled one.
        let _ = self.tx.send(Command::Schedule(entry));
        TimerHandle { cancelled }
    }

    /// Stop the worker. Pending tasks are discarded.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn worker(mut rx: UnboundedReceiver<Command>) {
    let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
    loop {
        let next_due = heap.peek().map(|e| e.due);
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Schedule(entry)) => heap.push(entry),
                Some(Command::Shutdown) | None => {
                    trace!(pending = heap.len(), "scheduler worker stopping");
                    return;
                }
            },
            _ = sleep_until_or_forever(next_due) => {}
        }
        fire_due(&mut heap);
    }
}

async fn sleep_until_or_forever(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending::<()>().await,
    }
}

fn fire_due(heap: &mut BinaryHeap<Entry>) {
    let now = Instant::now();
    while heap.peek().is_some_and(|e| e.due <= now) {
        let Some(mut entry) = heap.pop() else { break };
        if entry.cancelled.load(AtomicOrdering::Acquire) {
            continue;
        }
        let task = Arc::clone(&entry.task);
        tokio::spawn(async move { task() });
        if let Some(period) = entry.period {
            entry.due += period;
            heap.push(entry);
        }
    }
}
