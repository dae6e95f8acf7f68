//! Inbound remoting: accept loop, responder handshake, envelope dispatch.
//!
//! Dispatch policy per the delivery contract: an unresolvable target path
//! or an undecodable payload drops the frame with a warning and keeps the
//! connection alive; only codec-level errors close a link.

// Layer 1: Standard library imports
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::codec::FrameCodec;
use super::connection::run_ready;
use super::envelope::{EnvelopeKind, HandshakePayload, WireEnvelope};
use super::RemotingShared;
use crate::actor::refs::ReplyTo;
use crate::actor::signal::SystemSignal;
use crate::error::RtResult;
use crate::message::MessageRegistry;
use crate::path::ActorPath;

/// Bind the listener and start accepting. Returns the bound address
/// (port 0 resolves to an OS-assigned port here).
pub(crate) async fn bind(
    shared: Arc<RemotingShared>,
    host: &str,
    port: u16,
) -> RtResult<SocketAddr> {
    let listener = TcpListener::bind((host, port)).await?;
    let local_addr = listener.local_addr()?;
    tokio::spawn(accept_loop(listener, shared));
    Ok(local_addr)
}

async fn accept_loop(listener: TcpListener, shared: Arc<RemotingShared>) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(serve_connection(stream, peer, shared));
                }
                Err(error) => {
                    warn!(%error, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
    debug!("remoting accept loop stopped");
}

/// Responder side: require the initiator's handshake, answer with ours,
/// then run the shared ready loop until the link dies.
async fn serve_connection(stream: TcpStream, peer: SocketAddr, shared: Arc<RemotingShared>) {
    let mut framed = Framed::new(stream, FrameCodec::new(shared.cfg.max_frame_bytes));

    let first = match tokio::time::timeout(shared.cfg.heartbeat_timeout, framed.next()).await {
        Ok(Some(Ok(envelope))) => envelope,
        Ok(Some(Err(error))) => {
            warn!(%peer, %error, "rejecting connection: bad first frame");
            return;
        }
        Ok(None) | Err(_) => {
            debug!(%peer, "connection closed before handshake");
            return;
        }
    };
    if first.kind != EnvelopeKind::Handshake {
        warn!(%peer, kind = ?first.kind, "rejecting connection: expected HANDSHAKE");
        return;
    }
    let identity: HandshakePayload = match serde_json::from_value(first.payload) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%peer, %error, "rejecting connection: bad handshake payload");
            return;
        }
    };
    if framed.send(shared.local_handshake()).await.is_err() {
        return;
    }
    debug!(%peer, system = %identity.system, "inbound connection ready");

    let (reply_tx, mut reply_rx) = mpsc::channel(shared.cfg.connect_buffer);
    let end = run_ready(&mut framed, &mut reply_rx, &shared, &reply_tx).await;
    debug!(%peer, system = %identity.system, ?end, "inbound connection closed");
}

/// Route one decoded envelope into the local system.
///
/// `reply_tx` is the write queue of whichever connection carried the
/// envelope; ask replies travel back on it.
pub(crate) fn dispatch_envelope(
    shared: &RemotingShared,
    envelope: WireEnvelope,
    reply_tx: &mpsc::Sender<WireEnvelope>,
) {
    match envelope.kind {
        EnvelopeKind::Handshake | EnvelopeKind::Heartbeat => {}
        EnvelopeKind::AskResponse => {
            let Some(correlation_id) = envelope.correlation_id else {
                warn!("dropping ASK_RESPONSE without correlation_id");
                return;
            };
            if !shared
                .pending
                .complete(correlation_id, Ok((envelope.message_type, envelope.payload)))
            {
                debug!(%correlation_id, "ASK_RESPONSE for unknown or expired ask");
            }
        }
        EnvelopeKind::SystemMessage => {
            let Some(target) = shared.core.registry().resolve_str(&envelope.target_path) else {
                warn!(target_path = %envelope.target_path, "dropping system message for unknown path");
                return;
            };
            match envelope.message_type.as_str() {
                "stop" => target.send_system(SystemSignal::Stop),
                other => warn!(message_type = other, "unsupported system message"),
            }
        }
        EnvelopeKind::UserMessage | EnvelopeKind::AskRequest => {
            let Some(target) = shared.core.registry().resolve_str(&envelope.target_path) else {
                warn!(target_path = %envelope.target_path, "dropping message for unresolvable path");
                return;
            };
            let decoded = MessageRegistry::global()
                .deserialize(&envelope.message_type, envelope.payload);
            let any = match decoded {
                Ok(any) => any,
                Err(error) => {
                    warn!(%error, target_path = %envelope.target_path, "dropping undecodable message");
                    return;
                }
            };
            let sender = if envelope.kind == EnvelopeKind::AskRequest {
                match envelope.correlation_id {
                    Some(correlation_id) => {
                        let asker = envelope
                            .sender_path
                            .as_deref()
                            .and_then(|s| ActorPath::parse(s).ok());
                        let response_target = envelope.sender_path.clone().unwrap_or_default();
                        Some(ReplyTo::remote(
                            asker,
                            response_target,
                            correlation_id,
                            reply_tx.clone(),
                        ))
                    }
                    None => {
                        warn!("ASK_REQUEST without correlation_id; replies are impossible");
                        None
                    }
                }
            } else {
                None
            };
            if let Err(error) = target.deliver(any, sender) {
                warn!(%error, target_path = %envelope.target_path, "dropping mistyped message");
            }
        }
    }
}
