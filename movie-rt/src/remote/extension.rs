//! Remoting as an extension: server lifecycle, per-peer pools, pending
//! asks, and the address flip to TCP form.

// Layer 1: Standard library imports
use std::net::SocketAddr;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use super::pending::PendingAsks;
use super::pool::ConnectionPool;
use super::server;
use super::{RemotingConfig, RemotingShared};
use crate::error::{RtResult, RuntimeError};
use crate::extension::{Extension, ExtensionId};
use crate::path::Address;
use crate::system::SystemRef;

/// The remoting subsystem of one actor system.
///
/// Returned by [`ActorSystem::enable_remoting`](crate::system::ActorSystem::enable_remoting);
/// subsequent calls return this same instance (extension identity).
pub struct RemotingExtension {
    shared: Arc<RemotingShared>,
    local_addr: SocketAddr,
    pools: DashMap<String, Arc<ConnectionPool>>,
}

impl RemotingExtension {
    /// The bound TCP port (useful with port 0).
    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote asks still waiting for their response.
    pub fn pending_ask_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub(crate) fn shared(&self) -> Arc<RemotingShared> {
        Arc::clone(&self.shared)
    }

    /// The striped pool for a peer, created lazily.
    pub(crate) fn pool_for(&self, peer: &Address) -> Arc<ConnectionPool> {
        let key = peer.to_string();
        if let Some(pool) = self.pools.get(&key) {
            return Arc::clone(&pool);
        }
        let pool = Arc::new(ConnectionPool::new(peer.clone(), Arc::clone(&self.shared)));
        Arc::clone(
            self.pools
                .entry(key)
                .or_insert(pool)
                .value(),
        )
    }
}

impl Extension for RemotingExtension {
    fn stop(&self) {
        debug!(port = self.local_addr.port(), "remoting stopping");
        self.shared.cancel.cancel();
        self.shared.pending.fail_all(RuntimeError::Shutdown);
    }
}

/// Singleton key for the remoting extension.
pub struct RemotingExtensionId;

#[async_trait]
impl ExtensionId for RemotingExtensionId {
    type Ext = RemotingExtension;

    async fn create(&self, system: SystemRef) -> RtResult<Arc<RemotingExtension>> {
        let core = Arc::clone(system.core());
        let cfg = RemotingConfig::from_config(core.config())?;

        let (host, port) = match core.take_remoting_bind() {
            Some(bind) => bind,
            None => (
                core.config().get_string_or("remoting.host", "127.0.0.1")?,
                core.config().get_int_or("remoting.port", 0)? as u16,
            ),
        };

        let shared = Arc::new(RemotingShared {
            core: Arc::clone(&core),
            cfg,
            pending: PendingAsks::new(),
            cancel: CancellationToken::new(),
        });

        let local_addr = server::bind(Arc::clone(&shared), &host, port).await?;
        core.set_address(Address::tcp(core.name(), host, local_addr.port())?);

        let extension = Arc::new(RemotingExtension {
            shared,
            local_addr,
            pools: DashMap::new(),
        });
        core.set_remoting(Arc::clone(&extension));
        debug!(
            system = core.name(),
            port = local_addr.port(),
            "remoting enabled"
        );
        Ok(extension)
    }
}
