//! Remoting: the wire envelope, frame codec, connections, striped pools,
//! inbound server and transparent remote references.

pub mod codec;
pub(crate) mod connection;
pub mod envelope;
pub mod extension;
pub(crate) mod pending;
pub mod pool;
pub(crate) mod remote_ref;
pub(crate) mod server;

pub use codec::{FrameCodec, DEFAULT_MAX_FRAME_BYTES};
pub use envelope::{EnvelopeKind, HandshakePayload, WireEnvelope};
pub use extension::{RemotingExtension, RemotingExtensionId};
pub use pool::ConnectionPool;

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::config::Config;
use crate::error::{RtResult, RuntimeError};
use crate::system::core::SystemCore;
use self::pending::PendingAsks;

/// Reconnect backoff floor.
const RECONNECT_MIN: Duration = Duration::from_millis(100);
/// Reconnect backoff ceiling.
const RECONNECT_MAX: Duration = Duration::from_secs(30);
/// Reconnect backoff growth per attempt.
const RECONNECT_FACTOR: f64 = 2.0;
/// Reconnect jitter: +/-20%.
const RECONNECT_JITTER: f64 = 0.2;

/// Effective remoting settings, read once at extension creation.
#[derive(Debug, Clone)]
pub(crate) struct RemotingConfig {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub connect_buffer: usize,
    pub max_frame_bytes: usize,
    pub stripes: usize,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    pub reconnect_factor: f64,
    pub reconnect_jitter: f64,
}

impl RemotingConfig {
    pub(crate) fn from_config(config: &Config) -> RtResult<Self> {
        let stripes = config.get_int_or("remoting.stripes", 0)?;
        let stripes = if stripes <= 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            stripes as usize
        }
        .min(32);

        let connect_buffer = config.get_int_or("remoting.connect-buffer", 1024)?;
        let max_frame_bytes =
            config.get_int_or("remoting.max-frame-bytes", DEFAULT_MAX_FRAME_BYTES as i64)?;
        if connect_buffer <= 0 || max_frame_bytes <= 0 {
            return Err(RuntimeError::BadConfig(
                "remoting buffer and frame sizes must be positive".to_string(),
            ));
        }
        Ok(Self {
            heartbeat_interval: config
                .get_duration_or("remoting.heartbeat-interval", Duration::from_secs(2))?,
            heartbeat_timeout: config
                .get_duration_or("remoting.heartbeat-timeout", Duration::from_secs(6))?,
            connect_buffer: connect_buffer as usize,
            max_frame_bytes: max_frame_bytes as usize,
            stripes,
            reconnect_min: RECONNECT_MIN,
            reconnect_max: RECONNECT_MAX,
            reconnect_factor: RECONNECT_FACTOR,
            reconnect_jitter: RECONNECT_JITTER,
        })
    }
}

/// State shared by the server, every connection and every pool of one
/// system's remoting extension.
pub(crate) struct RemotingShared {
    pub(crate) core: Arc<SystemCore>,
    pub(crate) cfg: RemotingConfig,
    pub(crate) pending: PendingAsks,
    pub(crate) cancel: CancellationToken,
}

impl RemotingShared {
    /// The handshake envelope this system sends on every new link.
    pub(crate) fn local_handshake(&self) -> WireEnvelope {
        WireEnvelope::handshake(self.core.name(), self.core.address().to_string())
    }
}
