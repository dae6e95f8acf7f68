//! Remote references: the outbound half of location transparency.
//!
//! A `RemoteRef<M>` holds a target path and a pool handle. Sending
//! serializes through the message registry and hands the envelope to the
//! pool's consistent routing. Lookup and serialization failures on `tell`
//! are logged and dropped (at-most-once); on `ask` they fail the future.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::Serialize;
use tracing::warn;

// Layer 3: Internal module imports
use super::envelope::WireEnvelope;
use super::pool::ConnectionPool;
use crate::actor::refs::ReplyTo;
use crate::error::{RtResult, RuntimeError};
use crate::future::{Promise, RuntimeFuture};
use crate::message::{Message, MessageRegistry};
use crate::path::ActorPath;
use crate::system::core::SystemCore;
use crate::util::CorrelationId;

type EncodeFn<M> = Arc<dyn Fn(&M) -> RtResult<(&'static str, serde_json::Value)> + Send + Sync>;

pub(crate) struct RemoteRef<M: Message> {
    path: ActorPath,
    target: String,
    pool: Arc<ConnectionPool>,
    core: Arc<SystemCore>,
    encode: EncodeFn<M>,
}

impl<M: Message> Clone for RemoteRef<M> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            target: self.target.clone(),
            pool: Arc::clone(&self.pool),
            core: Arc::clone(&self.core),
            encode: Arc::clone(&self.encode),
        }
    }
}

impl<M: Message> RemoteRef<M> {
    /// Capture the encoder here, where `M: Serialize` is known, so the
    /// ref itself stays bound-free and interchangeable with local refs.
    pub(crate) fn new(path: ActorPath, pool: Arc<ConnectionPool>, core: Arc<SystemCore>) -> Self
    where
        M: Serialize,
    {
        let target = path.to_string();
        Self {
            path,
            target,
            pool,
            core,
            encode: Arc::new(|msg| MessageRegistry::global().serialize(msg)),
        }
    }

    pub(crate) fn path(&self) -> &ActorPath {
        &self.path
    }

    pub(crate) fn tell_with_sender(&self, msg: M, sender: Option<ReplyTo>) {
        let (tag, payload) = match (self.encode)(&msg) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(target_path = %self.target, %error, "dropping remote send");
                return;
            }
        };
        let sender_path = sender
            .as_ref()
            .and_then(|s| s.path().map(|p| p.to_string()));
        let envelope = WireEnvelope::user(self.target.clone(), tag, payload, sender_path);
        self.pool.send(envelope);
    }

    pub(crate) fn ask<Resp: Message>(&self, msg: M, timeout: Duration) -> RuntimeFuture<Resp> {
        let promise: Promise<Resp> = Promise::new();
        let future = promise.future();

        let (tag, payload) = match (self.encode)(&msg) {
            Ok(encoded) => encoded,
            Err(error) => {
                promise.try_failure(error);
                return future;
            }
        };
        let Some(remoting) = self.core.remoting() else {
            promise.try_failure(RuntimeError::BadConfig(
                "remoting is not enabled".to_string(),
            ));
            return future;
        };
        let shared = remoting.shared();
        let correlation_id = CorrelationId::new();

        // The completer decodes through the registry when the response
        // lands; the asker must have registered `Resp` (register-on-use).
        let completer = {
            let promise = promise.clone();
            Box::new(
                move |result: RtResult<(String, serde_json::Value)>| match result {
                    Ok((tag, payload)) => {
                        let decoded = MessageRegistry::global()
                            .deserialize(&tag, payload)
                            .and_then(|any| {
                                any.downcast::<Resp>().map_err(|other| {
                                    RuntimeError::AskFailed(format!(
                                        "unexpected reply type {:?}",
                                        other.tag()
                                    ))
                                })
                            });
                        match decoded {
                            Ok(value) => {
                                promise.try_success(value);
                            }
                            Err(error) => {
                                promise.try_failure(error);
                            }
                        }
                    }
                    Err(error) => {
                        promise.try_failure(error);
                    }
                },
            )
        };
        shared.pending.insert(correlation_id, completer);

        let timer = self.core.scheduler().schedule_once(timeout, {
            let shared = Arc::clone(&shared);
            let promise = promise.clone();
            move || {
                if shared.pending.remove(correlation_id) {
                    promise.try_failure(RuntimeError::AskTimeout(timeout));
                }
            }
        });
        {
            let timer = timer.clone();
            future.on_success(move |_| timer.cancel());
        }
        {
            let timer = timer.clone();
            future.on_failure(move |_| timer.cancel());
        }
        {
            let timer = timer.clone();
            future.on_cancel(move || timer.cancel());
        }

        let sender_path = self.core.temp_ask_path(correlation_id).to_string();
        let envelope = WireEnvelope::ask_request(
            self.target.clone(),
            tag,
            payload,
            correlation_id,
            sender_path,
        );
        self.pool.send(envelope);
        future
    }

    /// Remote stop: a SYSTEM_MESSAGE the receiving server maps onto the
    /// target's system lane.
    pub(crate) fn send_stop(&self) {
        let envelope = WireEnvelope::system(self.target.clone(), "stop");
        self.pool.send(envelope);
    }
}
