//! Two-lane actor mailbox.
//!
//! Every actor owns one mailbox with a *system* lane (lifecycle and
//! supervision signals, never dropped) and a *user* lane (typed messages,
//! bounded). Dequeue drains the system lane before the user lane, so a
//! stop enqueued behind a pile of user messages still wins.
//!
//! Enqueue never blocks the sender: a full user lane drops the newest
//! message and bumps a counter (at-most-once delivery). The system lane is
//! unbounded, which makes the "full system lane" invariant violation
//! unreachable instead of merely fatal.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;
use tracing::warn;

// Layer 3: Internal module imports
use crate::actor::signal::SystemSignal;
use crate::actor::ReplyTo;
use crate::message::Message;

/// A user-lane entry: the message plus the sender handle used by
/// `reply_if_asked`.
pub(crate) struct UserEnvelope<M: Message> {
    pub msg: M,
    pub sender: Option<ReplyTo>,
}

/// One dequeued item.
pub(crate) enum MailboxItem<M: Message> {
    System(SystemSignal),
    User(UserEnvelope<M>),
    Closed,
}

/// Receive half, owned exclusively by the actor's cell.
pub(crate) struct Mailbox<M: Message> {
    system: mpsc::UnboundedReceiver<SystemSignal>,
    user: mpsc::Receiver<UserEnvelope<M>>,
}

/// Send half; cheap to clone, shared by every local ref to the actor.
pub(crate) struct MailboxSender<M: Message> {
    system: mpsc::UnboundedSender<SystemSignal>,
    user: mpsc::Sender<UserEnvelope<M>>,
    dropped: Arc<AtomicU64>,
    label: Arc<str>,
    capacity: usize,
}

impl<M: Message> Clone for MailboxSender<M> {
    fn clone(&self) -> Self {
        Self {
            system: self.system.clone(),
            user: self.user.clone(),
            dropped: Arc::clone(&self.dropped),
            label: Arc::clone(&self.label),
            capacity: self.capacity,
        }
    }
}

/// Create a mailbox with the given user-lane capacity. The label shows up
/// in overflow warnings (usually the actor path).
pub(crate) fn channel<M: Message>(capacity: usize, label: &str) -> (Mailbox<M>, MailboxSender<M>) {
    let (system_tx, system_rx) = mpsc::unbounded_channel();
    let (user_tx, user_rx) = mpsc::channel(capacity.max(1));
    (
        Mailbox {
            system: system_rx,
            user: user_rx,
        },
        MailboxSender {
            system: system_tx,
            user: user_tx,
            dropped: Arc::new(AtomicU64::new(0)),
            label: Arc::from(label),
            capacity: capacity.max(1),
        },
    )
}

impl<M: Message> Mailbox<M> {
    /// Dequeue the next item, system lane first.
    pub(crate) async fn next(&mut self) -> MailboxItem<M> {
        // Fast path: a pending system signal always wins.
        match self.system.try_recv() {
            Ok(sig) => return MailboxItem::System(sig),
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => return MailboxItem::Closed,
        }
        tokio::select! {
            biased;
            sig = self.system.recv() => match sig {
                Some(sig) => MailboxItem::System(sig),
                None => MailboxItem::Closed,
            },
            env = self.user.recv() => match env {
                Some(env) => MailboxItem::User(env),
                None => MailboxItem::Closed,
            },
        }
    }

    /// Await the next system signal, leaving the user lane untouched.
    /// Used while suspended, stopping or restarting.
    pub(crate) async fn next_system(&mut self) -> Option<SystemSignal> {
        self.system.recv().await
    }

    /// Discard all queued user messages, returning how many were dropped.
    pub(crate) fn drain_user(&mut self) -> usize {
        let mut drained = 0;
        while self.user.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

impl<M: Message> MailboxSender<M> {
    /// Non-blocking user-lane enqueue: drop-newest with a counted warning
    /// when full. Returns whether the message was enqueued.
    pub(crate) fn try_send_user(&self, envelope: UserEnvelope<M>) -> bool {
        match self.user.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let count = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if count == 1 || count % 1024 == 0 {
                    warn!(
                        mailbox = %self.label,
                        dropped = count,
                        capacity = self.capacity,
                        "user mailbox full, dropping newest message"
                    );
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// System-lane enqueue. Unbounded; a closed lane means the actor is
    /// already gone, and the signal becomes a no-op.
    pub(crate) fn send_system(&self, signal: SystemSignal) {
        let _ = self.system.send(signal);
    }

    /// Clone of the raw system-lane sender (parent linkage).
    pub(crate) fn system_sender(&self) -> mpsc::UnboundedSender<SystemSignal> {
        self.system.clone()
    }

    /// Messages dropped from the user lane so far.
    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestMessage(u32);

    impl Message for TestMessage {
        const MESSAGE_TYPE: &'static str = "mailbox_test_message";
    }

    fn envelope(n: u32) -> UserEnvelope<TestMessage> {
        UserEnvelope {
            msg: TestMessage(n),
            sender: None,
        }
    }

    #[tokio::test]
    async fn test_fifo_within_user_lane() {
        let (mut mailbox, sender) = channel::<TestMessage>(8, "/test");
        for n in 0..4 {
            assert!(sender.try_send_user(envelope(n)));
        }
        for n in 0..4 {
            match mailbox.next().await {
                MailboxItem::User(env) => assert_eq!(env.msg, TestMessage(n)),
                _ => panic!("expected user message"),
            }
        }
    }

    #[tokio::test]
    async fn test_system_lane_precedes_user_lane() {
        let (mut mailbox, sender) = channel::<TestMessage>(8, "/test");
        sender.try_send_user(envelope(1));
        sender.try_send_user(envelope(2));
        sender.send_system(SystemSignal::Stop);

        // Stop was enqueued last but must come out first.
        assert!(matches!(
            mailbox.next().await,
            MailboxItem::System(SystemSignal::Stop)
        ));
    }

    #[tokio::test]
    async fn test_overflow_drops_newest_and_counts() {
        let (mut mailbox, sender) = channel::<TestMessage>(2, "/test");
        assert!(sender.try_send_user(envelope(1)));
        assert!(sender.try_send_user(envelope(2)));
        assert!(!sender.try_send_user(envelope(3)));
        assert!(!sender.try_send_user(envelope(4)));
        assert_eq!(sender.dropped_count(), 2);

        // The oldest messages survived.
        match mailbox.next().await {
            MailboxItem::User(env) => assert_eq!(env.msg, TestMessage(1)),
            _ => panic!("expected user message"),
        }
    }

    #[tokio::test]
    async fn test_drain_user_clears_queue() {
        let (mut mailbox, sender) = channel::<TestMessage>(8, "/test");
        for n in 0..5 {
            sender.try_send_user(envelope(n));
        }
        assert_eq!(mailbox.drain_user(), 5);
        sender.send_system(SystemSignal::Stop);
        assert!(matches!(
            mailbox.next().await,
            MailboxItem::System(SystemSignal::Stop)
        ));
    }

    #[tokio::test]
    async fn test_next_system_skips_user_lane() {
        let (mut mailbox, sender) = channel::<TestMessage>(8, "/test");
        sender.try_send_user(envelope(1));
        sender.send_system(SystemSignal::Restart);

        assert!(matches!(
            mailbox.next_system().await,
            Some(SystemSignal::Restart)
        ));
        // The user message is still queued.
        assert!(matches!(mailbox.next().await, MailboxItem::User(_)));
    }
}
