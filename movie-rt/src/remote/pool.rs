//! Striped connection pool: N parallel TCP links per peer.
//!
//! Routing modes:
//! - [`ConnectionPool::connection_for`]: consistent: the hash of the
//!   target path picks the stripe, so one actor's messages always share
//!   one TCP stream and arrive in send order;
//! - [`ConnectionPool::send_round_robin`]: maximum parallelism, no
//!   ordering guarantee;
//! - [`ConnectionPool::stripe`]: direct index for callers that pin a
//!   stripe themselves.
//!
//! Stripes are created lazily on first selection.

// Layer 1: Standard library imports
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;

// Layer 3: Internal module imports
use super::connection::Connection;
use super::envelope::WireEnvelope;
use super::RemotingShared;
use crate::path::Address;

/// Pool of striped connections to one remote peer.
pub struct ConnectionPool {
    peer: Address,
    shared: Arc<RemotingShared>,
    stripes: RwLock<Vec<Option<Arc<Connection>>>>,
    count: usize,
    round_robin: AtomicUsize,
}

impl ConnectionPool {
    pub(crate) fn new(peer: Address, shared: Arc<RemotingShared>) -> Self {
        let count = shared.cfg.stripes.max(1);
        Self {
            peer,
            shared,
            stripes: RwLock::new(vec![None; count]),
            count,
            round_robin: AtomicUsize::new(0),
        }
    }

    /// The peer this pool serves.
    pub fn peer(&self) -> &Address {
        &self.peer
    }

    /// Number of stripes (fixed at pool creation).
    pub fn stripe_count(&self) -> usize {
        self.count
    }

    /// The stripe at `index mod N`, created on first use.
    pub(crate) fn stripe(&self, index: usize) -> Arc<Connection> {
        let slot = index % self.count;
        {
            let stripes = self.stripes.read();
            if let Some(Some(connection)) = stripes.get(slot) {
                return Arc::clone(connection);
            }
        }
        let mut stripes = self.stripes.write();
        if let Some(Some(connection)) = stripes.get(slot) {
            return Arc::clone(connection);
        }
        let connection = Connection::connect(self.peer.clone(), slot, Arc::clone(&self.shared));
        stripes[slot] = Some(Arc::clone(&connection));
        connection
    }

    /// Consistent stripe for a target path: stable within the process,
    /// so per-actor ordering holds.
    pub(crate) fn connection_for(&self, target_path: &str) -> Arc<Connection> {
        self.stripe(Self::stripe_index(target_path, self.count))
    }

    pub(crate) fn stripe_index(target_path: &str, count: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        target_path.hash(&mut hasher);
        (hasher.finish() as usize) % count
    }

    /// Send on the stripe owning the envelope's target path (consistent
    /// routing; preserves per-actor order).
    pub fn send(&self, envelope: WireEnvelope) -> bool {
        let connection = self.connection_for(&envelope.target_path);
        connection.try_send(envelope)
    }

    /// Send on the next stripe in rotation (unordered, maximum
    /// parallelism).
    pub fn send_round_robin(&self, envelope: WireEnvelope) -> bool {
        let index = self.round_robin.fetch_add(1, Ordering::Relaxed);
        self.stripe(index).try_send(envelope)
    }

    /// Send on the stripe at `index mod N`, for callers that pin a
    /// dedicated stripe to eliminate contention.
    pub fn send_on_stripe(&self, index: usize, envelope: WireEnvelope) -> bool {
        self.stripe(index).try_send(envelope)
    }

    /// Envelopes accepted across all live stripes.
    pub fn sent_count(&self) -> u64 {
        self.stripes
            .read()
            .iter()
            .flatten()
            .map(|c| c.sent_count())
            .sum()
    }

    /// Envelopes dropped across all live stripes (full buffers).
    pub fn dropped_count(&self) -> u64 {
        self.stripes
            .read()
            .iter()
            .flatten()
            .map(|c| c.dropped_count())
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_index_is_stable() {
        let path = "movie.tcp://server@127.0.0.1:9001/user/echo";
        let first = ConnectionPool::stripe_index(path, 8);
        for _ in 0..100 {
            assert_eq!(ConnectionPool::stripe_index(path, 8), first);
        }
    }

    #[test]
    fn test_stripe_index_in_range() {
        for count in [1, 2, 7, 32] {
            for i in 0..64 {
                let path = format!("/user/actor-{i}");
                assert!(ConnectionPool::stripe_index(&path, count) < count);
            }
        }
    }

    #[test]
    fn test_different_paths_spread() {
        // not a distribution test, just "not everything on one stripe"
        let hits: std::collections::HashSet<usize> = (0..64)
            .map(|i| ConnectionPool::stripe_index(&format!("/user/a{i}"), 8))
            .collect();
        assert!(hits.len() > 1);
    }
}
