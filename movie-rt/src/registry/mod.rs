//! Path registry: the system-local bidirectional map between actor paths
//! and live actors.
//!
//! Inbound remoting dispatch resolves envelope target paths here; the
//! kernel registers every spawned actor and unregisters it at
//! termination. Keys are the segments-only form (`/user/echo`), because
//! the registry is local to one system and the address part is implied.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tracing::debug;

// Layer 3: Internal module imports
use crate::actor::refs::DynActorRef;
use crate::path::ActorPath;
use crate::util::ActorId;

pub(crate) struct PathRegistry {
    system: String,
    by_path: DashMap<String, DynActorRef>,
    by_id: DashMap<ActorId, String>,
}

impl PathRegistry {
    pub(crate) fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            by_path: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Register an actor under its path. A re-registration at the same
    /// path replaces the entry (restart keeps the same path and id).
    pub(crate) fn register(&self, actor: DynActorRef) {
        let key = actor.path.path_str();
        self.by_id.insert(actor.id, key.clone());
        self.by_path.insert(key, actor);
    }

    /// Resolve a parsed path.
    pub(crate) fn resolve_path(&self, path: &ActorPath) -> Option<DynActorRef> {
        if path.address().system() != self.system {
            return None;
        }
        self.by_path.get(&path.path_str()).map(|e| e.clone())
    }

    /// Resolve a path string: full URI or bare (`/user/x`, `user/x`).
    pub(crate) fn resolve_str(&self, input: &str) -> Option<DynActorRef> {
        if input.starts_with("movie://") || input.starts_with("movie.tcp://") {
            let path = ActorPath::parse(input).ok()?;
            return self.resolve_path(&path);
        }
        let key = if input.starts_with('/') {
            input.to_string()
        } else {
            format!("/{input}")
        };
        self.by_path.get(&key).map(|e| e.clone())
    }

    /// The registered path of an actor id, if it is still alive.
    #[allow(dead_code)] // registry surface, exercised in tests
    pub(crate) fn path_for(&self, id: &ActorId) -> Option<String> {
        self.by_id.get(id).map(|e| e.clone())
    }

    /// Drop the entry for a terminated actor.
    ///
    /// Only removes the path mapping if it still points at this id, so a
    /// replacement registered under the same path survives.
    pub(crate) fn unregister(&self, id: &ActorId) {
        if let Some((_, key)) = self.by_id.remove(id) {
            let stale = self
                .by_path
                .get(&key)
                .map(|entry| entry.id == *id)
                .unwrap_or(false);
            if stale {
                self.by_path.remove(&key);
            }
            debug!(path = %key, "unregistered actor");
        }
    }

    /// Number of live registrations.
    #[allow(dead_code)] // registry surface, exercised in tests
    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mailbox;
    use crate::message::Message;
    use crate::path::Address;

    #[derive(Debug, Clone)]
    struct TestMsg;

    impl Message for TestMsg {
        const MESSAGE_TYPE: &'static str = "registry_test_msg";
    }

    fn entry(path: &str) -> DynActorRef {
        let address = Address::local("testsys").unwrap();
        let path = ActorPath::resolve(path, &address).unwrap();
        let (_mailbox, sender) = mailbox::channel::<TestMsg>(8, &path.path_str());
        DynActorRef::new(ActorId::new(), path, sender)
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = PathRegistry::new("testsys");
        let actor = entry("/user/echo");
        let id = actor.id;
        registry.register(actor);

        assert!(registry.resolve_str("/user/echo").is_some());
        assert!(registry.resolve_str("user/echo").is_some());
        assert_eq!(registry.path_for(&id).unwrap(), "/user/echo");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_full_uri() {
        let registry = PathRegistry::new("testsys");
        registry.register(entry("/user/echo"));

        assert!(registry.resolve_str("movie://testsys/user/echo").is_some());
        // remote form of the same system name also resolves
        assert!(registry
            .resolve_str("movie.tcp://testsys@127.0.0.1:9001/user/echo")
            .is_some());
        // another system's path does not
        assert!(registry.resolve_str("movie://other/user/echo").is_none());
    }

    #[test]
    fn test_unregister_removes_both_directions() {
        let registry = PathRegistry::new("testsys");
        let actor = entry("/user/echo");
        let id = actor.id;
        registry.register(actor);

        registry.unregister(&id);
        assert!(registry.resolve_str("/user/echo").is_none());
        assert!(registry.path_for(&id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_unregister_keeps_replacement() {
        let registry = PathRegistry::new("testsys");
        let old = entry("/user/echo");
        let old_id = old.id;
        registry.register(old);

        // replacement under the same path (e.g. respawn)
        let new = entry("/user/echo");
        let new_id = new.id;
        registry.register(new);

        // the old actor's late unregister must not evict the replacement
        registry.unregister(&old_id);
        assert_eq!(registry.resolve_str("/user/echo").unwrap().id, new_id);
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let registry = PathRegistry::new("testsys");
        assert!(registry.resolve_str("/user/ghost").is_none());
    }
}
