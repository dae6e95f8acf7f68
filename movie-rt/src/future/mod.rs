//! Single-assignment futures for the ask pattern.
//!
//! A [`Promise`] is the write side, a [`RuntimeFuture`] the read side of a
//! cell that is completed exactly once: success, failure, or cancellation,
//! whichever comes first. Observers registered on the future run on the
//! default dispatcher in registration order; [`RuntimeFuture::await_result`]
//! suspends the caller until completion.
//!
//! Inside an actor, never await a future: project its outcome back into
//! the mailbox with [`pipe_to`](crate::actor::ActorContext::pipe_to)
//! instead.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};

/// Completed value of a future.
#[derive(Debug, Clone)]
enum Outcome<T> {
    Success(T),
    Failure(RuntimeError),
    Cancelled,
}

enum Observer<T> {
    Success(Box<dyn FnOnce(T) + Send>),
    Failure(Box<dyn FnOnce(RuntimeError) + Send>),
    Cancel(Box<dyn FnOnce() + Send>),
}

enum State<T> {
    Pending(Vec<Observer<T>>),
    Done(Outcome<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Write side of a single-assignment cell.
pub struct Promise<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Read side of a single-assignment cell. Cheap to clone.
pub struct RuntimeFuture<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Clone for RuntimeFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Create a fresh, pending promise.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                notify: Notify::new(),
            }),
        }
    }

    /// The read side of this promise.
    pub fn future(&self) -> RuntimeFuture<T> {
        RuntimeFuture {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Complete with a value. Returns false if already completed.
    pub fn try_success(&self, value: T) -> bool {
        self.complete(Outcome::Success(value))
    }

    /// Complete with an error. Returns false if already completed.
    pub fn try_failure(&self, error: RuntimeError) -> bool {
        self.complete(Outcome::Failure(error))
    }

    /// Cancel. Returns false if already completed.
    pub fn try_cancel(&self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    fn complete(&self, outcome: Outcome<T>) -> bool {
        let observers = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Done(_) => return false,
                State::Pending(observers) => {
                    let taken = std::mem::take(observers);
                    *state = State::Done(outcome.clone());
                    taken
                }
            }
        };
        self.shared.notify.notify_waiters();
        dispatch_observers(observers, outcome);
        true
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> RuntimeFuture<T> {
    /// Whether the cell has been completed (any outcome).
    pub fn is_completed(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Done(_))
    }

    /// Observe success. Runs on the default dispatcher, after previously
    /// registered observers.
    pub fn on_success(&self, f: impl FnOnce(T) + Send + 'static) {
        self.register(Observer::Success(Box::new(f)));
    }

    /// Observe failure.
    pub fn on_failure(&self, f: impl FnOnce(RuntimeError) + Send + 'static) {
        self.register(Observer::Failure(Box::new(f)));
    }

    /// Observe cancellation.
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        self.register(Observer::Cancel(Box::new(f)));
    }

    fn register(&self, observer: Observer<T>) {
        let late = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending(observers) => {
                    observers.push(observer);
                    None
                }
                State::Done(outcome) => Some((observer, outcome.clone())),
            }
        };
        if let Some((observer, outcome)) = late {
            dispatch_observers(vec![observer], outcome);
        }
    }

    /// Suspend until the cell completes, with an optional timeout.
    ///
    /// A timeout fails with [`RuntimeError::AskTimeout`]; cancellation
    /// surfaces as [`RuntimeError::AskFailed`].
    pub async fn await_result(&self, timeout: Option<Duration>) -> RtResult<T> {
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .map_err(|_| RuntimeError::AskTimeout(limit))?,
            None => self.wait().await,
        };
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
            Outcome::Cancelled => Err(RuntimeError::AskFailed("future cancelled".to_string())),
        }
    }

    async fn wait(&self) -> Outcome<T> {
        loop {
            // Arm the waiter before inspecting state so a concurrent
            // completion cannot slip between check and sleep.
            let notified = self.shared.notify.notified();
            if let State::Done(outcome) = &*self.shared.state.lock() {
                return outcome.clone();
            }
            notified.await;
        }
    }
}

/// Run observers in registration order on the default dispatcher.
fn dispatch_observers<T: Clone + Send + 'static>(observers: Vec<Observer<T>>, outcome: Outcome<T>) {
    if observers.is_empty() {
        return;
    }
    let run = move || {
        for observer in observers {
            match (&outcome, observer) {
                (Outcome::Success(value), Observer::Success(f)) => f(value.clone()),
                (Outcome::Failure(error), Observer::Failure(f)) => f(error.clone()),
                (Outcome::Cancelled, Observer::Cancel(f)) => f(),
                _ => {}
            }
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { run() });
        }
        Err(_) => run(),
    }
}
