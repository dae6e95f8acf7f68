//! Lazily-instantiated, system-scoped singletons.
//!
//! An [`ExtensionId`] is a singleton key: the first
//! [`extension`](crate::system::ActorSystem::extension) call for an id
//! runs its `create` (serialized per id; concurrent callers wait), and
//! every later call returns the same `Arc` for the life of the system.
//! Shutdown stops created extensions in reverse creation order.
//! Remoting is itself an extension.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};
use crate::system::SystemRef;

/// A system-scoped singleton. Extensions may spawn actors under
/// `/system` through the [`SystemRef`] they receive at creation.
pub trait Extension: Any + Send + Sync + 'static {
    /// Called once at system shutdown, in reverse creation order.
    fn stop(&self) {}
}

/// Identity of an extension. The implementing type itself is the key:
/// two calls with the same id type yield the same instance.
#[async_trait]
pub trait ExtensionId: Send + Sync + 'static {
    type Ext: Extension;

    /// Build the extension. Runs at most once per system.
    async fn create(&self, system: SystemRef) -> RtResult<Arc<Self::Ext>>;
}

struct StopEntry {
    type_id: TypeId,
    stop: Arc<dyn Fn() + Send + Sync>,
}

/// Per-system extension table.
pub(crate) struct Extensions {
    slots: DashMap<TypeId, Arc<OnceCell<Arc<dyn Any + Send + Sync>>>>,
    created: Mutex<Vec<StopEntry>>,
}

impl Extensions {
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// The singleton for `id`, creating it on first call.
    pub(crate) async fn get_or_create<I: ExtensionId>(
        &self,
        id: &I,
        system: SystemRef,
    ) -> RtResult<Arc<I::Ext>> {
        let slot = {
            let entry = self
                .slots
                .entry(TypeId::of::<I>())
                .or_insert_with(|| Arc::new(OnceCell::new()));
            Arc::clone(entry.value())
        };
        let any = slot
            .get_or_try_init(|| async {
                let ext = id.create(system).await?;
                let for_stop = Arc::clone(&ext);
                self.created.lock().push(StopEntry {
                    type_id: TypeId::of::<I>(),
                    stop: Arc::new(move || for_stop.stop()),
                });
                debug!(extension = std::any::type_name::<I>(), "extension created");
                Ok::<Arc<dyn Any + Send + Sync>, RuntimeError>(ext)
            })
            .await?;
        Arc::clone(any)
            .downcast::<I::Ext>()
            .map_err(|_| RuntimeError::failure("extension slot holds an unexpected type"))
    }

    /// Whether `id` has been created already.
    #[allow(dead_code)]
    pub(crate) fn is_created<I: ExtensionId>(&self) -> bool {
        self.created
            .lock()
            .iter()
            .any(|entry| entry.type_id == TypeId::of::<I>())
    }

    /// Stop all created extensions, newest first.
    pub(crate) fn stop_all(&self) {
        let entries = {
            let mut created = self.created.lock();
            created.drain(..).collect::<Vec<_>>()
        };
        for entry in entries.into_iter().rev() {
            (entry.stop)();
        }
    }
}
