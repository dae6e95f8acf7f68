//! One TCP link: framed I/O, handshake, heartbeat, reconnect.
//!
//! The connection owns a bounded write queue. While the link is down
//! (connecting, handshaking, between reconnect attempts) sends keep
//! queuing until the buffer is full, then drop with a counter: the
//! at-most-once contract. Inbound frames on an outbound connection are
//! dispatched exactly like server frames, which is what lets an
//! `ASK_RESPONSE` come back on the link that carried the request.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::codec::FrameCodec;
use super::envelope::{EnvelopeKind, HandshakePayload, WireEnvelope};
use super::server::dispatch_envelope;
use super::{RemotingConfig, RemotingShared};
use crate::error::{RtResult, RuntimeError};
use crate::path::{Address, Endpoint};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Handshaking,
    Ready,
    Closed,
}

/// Why a ready link ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkEnd {
    Reconnect,
    Shutdown,
}

/// Outbound TCP link to one peer stripe.
pub(crate) struct Connection {
    peer: Address,
    stripe: usize,
    tx: mpsc::Sender<WireEnvelope>,
    state: Arc<RwLock<LinkState>>,
    sent: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl Connection {
    /// Start the driver task; the link comes up in the background.
    pub(crate) fn connect(
        peer: Address,
        stripe: usize,
        shared: Arc<RemotingShared>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(shared.cfg.connect_buffer);
        let state = Arc::new(RwLock::new(LinkState::Connecting));
        let connection = Arc::new(Self {
            peer: peer.clone(),
            stripe,
            tx: tx.clone(),
            state: Arc::clone(&state),
            sent: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        });
        tokio::spawn(drive(peer, stripe, shared, rx, state, tx));
        connection
    }

    /// Queue an envelope. Drops (counted) when the buffer is full or the
    /// driver is gone.
    pub(crate) fn try_send(&self, envelope: WireEnvelope) -> bool {
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1024 == 0 {
                    warn!(
                        peer = %self.peer,
                        stripe = self.stripe,
                        dropped,
                        "connection buffer full, dropping message"
                    );
                }
                false
            }
        }
    }

    #[allow(dead_code)] // diagnostic surface, exercised in tests
    pub(crate) fn state(&self) -> LinkState {
        *self.state.read()
    }

    pub(crate) fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Driver: connect, handshake, run ready loop, reconnect with backoff.
async fn drive(
    peer: Address,
    stripe: usize,
    shared: Arc<RemotingShared>,
    mut rx: mpsc::Receiver<WireEnvelope>,
    state: Arc<RwLock<LinkState>>,
    reply_tx: mpsc::Sender<WireEnvelope>,
) {
    let Some(endpoint) = peer.endpoint().cloned() else {
        warn!(peer = %peer, "connection to a local address is meaningless");
        return;
    };
    let mut attempt: u32 = 0;
    loop {
        if shared.cancel.is_cancelled() {
            break;
        }
        *state.write() = LinkState::Connecting;
        match connect_endpoint(&endpoint).await {
            Ok(stream) => {
                let mut framed =
                    Framed::new(stream, FrameCodec::new(shared.cfg.max_frame_bytes));
                *state.write() = LinkState::Handshaking;
                match initiate_handshake(&mut framed, &shared).await {
                    Ok(peer_system) => {
                        debug!(peer = %peer, stripe, %peer_system, "connection ready");
                        *state.write() = LinkState::Ready;
                        attempt = 0;
                        let end = run_ready(&mut framed, &mut rx, &shared, &reply_tx).await;
                        debug!(peer = %peer, stripe, ?end, "connection ended");
                        if end == LinkEnd::Shutdown {
                            break;
                        }
                    }
                    Err(error) => debug!(peer = %peer, stripe, %error, "handshake failed"),
                }
            }
            Err(error) => debug!(peer = %peer, stripe, %error, "connect failed"),
        }
        *state.write() = LinkState::Closed;
        attempt = attempt.saturating_add(1);
        let delay = reconnect_delay(&shared.cfg, attempt);
        debug!(peer = %peer, stripe, attempt, ?delay, "scheduling reconnect");
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    *state.write() = LinkState::Closed;
}

async fn connect_endpoint(endpoint: &Endpoint) -> RtResult<TcpStream> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
    Ok(stream)
}

/// Initiator side: send our identity, require the responder's.
async fn initiate_handshake(
    framed: &mut Framed<TcpStream, FrameCodec>,
    shared: &RemotingShared,
) -> RtResult<String> {
    framed.send(shared.local_handshake()).await?;
    let frame = tokio::time::timeout(shared.cfg.heartbeat_timeout, framed.next())
        .await
        .map_err(|_| RuntimeError::ProtocolViolation("handshake timed out".to_string()))?;
    let reply = match frame {
        Some(result) => result?,
        None => {
            return Err(RuntimeError::ProtocolViolation(
                "connection closed during handshake".to_string(),
            ))
        }
    };
    if reply.kind != EnvelopeKind::Handshake {
        return Err(RuntimeError::ProtocolViolation(format!(
            "expected HANDSHAKE, got {:?}",
            reply.kind
        )));
    }
    let payload: HandshakePayload = serde_json::from_value(reply.payload)
        .map_err(|e| RuntimeError::ProtocolViolation(format!("bad handshake payload: {e}")))?;
    Ok(payload.system)
}

/// Shared ready loop for outbound connections and accepted server links.
///
/// Writes drain the queue; every received frame refreshes liveness;
/// heartbeats go out on the interval; silence past the timeout closes
/// the link.
pub(crate) async fn run_ready(
    framed: &mut Framed<TcpStream, FrameCodec>,
    rx: &mut mpsc::Receiver<WireEnvelope>,
    shared: &RemotingShared,
    reply_tx: &mpsc::Sender<WireEnvelope>,
) -> LinkEnd {
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + shared.cfg.heartbeat_interval,
        shared.cfg.heartbeat_interval,
    );
    let mut last_rx = Instant::now();
    loop {
        let idle_deadline = last_rx + shared.cfg.heartbeat_timeout;
        tokio::select! {
            _ = shared.cancel.cancelled() => return LinkEnd::Shutdown,
            outbound = rx.recv() => match outbound {
                Some(envelope) => {
                    if let Err(error) = framed.send(envelope).await {
                        warn!(%error, "write failed, closing connection");
                        return LinkEnd::Reconnect;
                    }
                }
                None => return LinkEnd::Shutdown,
            },
            frame = framed.next() => match frame {
                Some(Ok(envelope)) => {
                    last_rx = Instant::now();
                    match envelope.kind {
                        EnvelopeKind::Heartbeat | EnvelopeKind::Handshake => {}
                        _ => dispatch_envelope(shared, envelope, reply_tx),
                    }
                }
                Some(Err(error)) => {
                    warn!(%error, "closing connection on decode error");
                    return LinkEnd::Reconnect;
                }
                None => {
                    debug!("peer closed connection");
                    return LinkEnd::Reconnect;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(error) = framed.send(WireEnvelope::heartbeat()).await {
                    warn!(%error, "heartbeat write failed, closing connection");
                    return LinkEnd::Reconnect;
                }
            }
            _ = tokio::time::sleep_until(idle_deadline) => {
                warn!("no frame within heartbeat timeout, closing connection");
                return LinkEnd::Reconnect;
            }
        }
    }
}

/// `min * factor^(attempt-1)`, capped at `max`, with +/-jitter applied.
fn reconnect_delay(cfg: &RemotingConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = cfg.reconnect_min.as_millis() as f64 * cfg.reconnect_factor.powi(exponent as i32);
    let capped = base.min(cfg.reconnect_max.as_millis() as f64);
    let jitter = 1.0 + rand::thread_rng().gen_range(-cfg.reconnect_jitter..=cfg.reconnect_jitter);
    Duration::from_millis((capped * jitter).max(1.0) as u64)
}
