//! Outstanding remote asks, indexed by correlation id.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};
use crate::util::CorrelationId;

type Completer = Box<dyn FnOnce(RtResult<(String, serde_json::Value)>) + Send + Sync>;

/// Table of asks awaiting their `ASK_RESPONSE`.
pub(crate) struct PendingAsks {
    map: DashMap<CorrelationId, Completer>,
}

impl PendingAsks {
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub(crate) fn insert(&self, correlation_id: CorrelationId, completer: Completer) {
        self.map.insert(correlation_id, completer);
    }

    /// Complete and remove; false when the id is unknown (late or
    /// duplicate response).
    pub(crate) fn complete(
        &self,
        correlation_id: CorrelationId,
        result: RtResult<(String, serde_json::Value)>,
    ) -> bool {
        match self.map.remove(&correlation_id) {
            Some((_, completer)) => {
                completer(result);
                true
            }
            None => false,
        }
    }

    /// Remove without completing (timeout path already failed the
    /// promise). Returns whether the entry existed.
    pub(crate) fn remove(&self, correlation_id: CorrelationId) -> bool {
        self.map.remove(&correlation_id).is_some()
    }

    /// Fail everything (extension stop / system shutdown).
    pub(crate) fn fail_all(&self, error: RuntimeError) {
        let correlations: Vec<CorrelationId> = self.map.iter().map(|e| *e.key()).collect();
        for correlation_id in correlations {
            if let Some((_, completer)) = self.map.remove(&correlation_id) {
                completer(Err(error.clone()));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_complete_runs_once() {
        let pending = PendingAsks::new();
        let correlation_id = CorrelationId::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        pending.insert(
            correlation_id,
            Box::new(move |result| {
                assert!(result.is_ok());
                flag.store(true, Ordering::SeqCst);
            }),
        );
        assert_eq!(pending.len(), 1);

        assert!(pending.complete(correlation_id, Ok(("t".into(), serde_json::json!({})))));
        assert!(ran.load(Ordering::SeqCst));
        // second completion finds nothing
        assert!(!pending.complete(correlation_id, Ok(("t".into(), serde_json::json!({})))));
    }

    #[test]
    fn test_remove_without_completing() {
        let pending = PendingAsks::new();
        let correlation_id = CorrelationId::new();
        pending.insert(correlation_id, Box::new(|_| {}));

        assert!(pending.remove(correlation_id));
        assert!(!pending.remove(correlation_id));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_fail_all_delivers_error() {
        let pending = PendingAsks::new();
        let failed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed);
        pending.insert(
            CorrelationId::new(),
            Box::new(move |result| {
                assert!(matches!(result, Err(RuntimeError::Shutdown)));
                flag.store(true, Ordering::SeqCst);
            }),
        );

        pending.fail_all(RuntimeError::Shutdown);
        assert!(failed.load(Ordering::SeqCst));
        assert_eq!(pending.len(), 0);
    }
}
