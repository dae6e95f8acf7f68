//! Process-global message registry: wire tag -> decoder.
//!
//! Static typing and a dynamic wire co-exist through this table. A
//! `RemoteRef<M>` knows `M` at compile time; at the boundary the payload
//! travels as JSON under `M::MESSAGE_TYPE`, and the receiving side uses
//! the registry to turn it back into the concrete type. Both peers must
//! register a type before messages of that type are sent.
//!
//! The registry is the one piece of process-global state in the runtime:
//! it is logically a shared type table, so separate systems in one process
//! (the usual test setup) see the same entries. Registration is idempotent
//! per tag.

// Layer 1: Standard library imports
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

// Layer 3: Internal module imports
use super::traits::Message;
use crate::error::{RtResult, RuntimeError};

/// Type-erased message recovered from the wire.
///
/// Wraps the concrete value behind `dyn Any` together with its tag;
/// [`AnyMessage::downcast`] recovers the concrete type.
pub struct AnyMessage {
    tag: &'static str,
    value: Box<dyn Any + Send>,
}

impl AnyMessage {
    /// Wrap a concrete message.
    pub fn new<T: Message>(value: T) -> Self {
        Self {
            tag: T::MESSAGE_TYPE,
            value: Box::new(value),
        }
    }

    /// The wire tag of the wrapped value.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Whether the wrapped value is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Unwrap to the concrete type, returning `self` on mismatch.
    pub fn downcast<T: Message>(self) -> Result<T, AnyMessage> {
        let tag = self.tag;
        match self.value.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(value) => Err(AnyMessage { tag, value }),
        }
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMessage").field("tag", &self.tag).finish()
    }
}

type DecodeFn = Arc<dyn Fn(serde_json::Value) -> RtResult<AnyMessage> + Send + Sync>;

struct RegistryEntry {
    decode: DecodeFn,
}

/// Tag -> decoder table shared by every system in the process.
pub struct MessageRegistry {
    entries: DashMap<&'static str, RegistryEntry>,
}

static GLOBAL: OnceLock<MessageRegistry> = OnceLock::new();

impl MessageRegistry {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The process-global registry.
    pub fn global() -> &'static MessageRegistry {
        GLOBAL.get_or_init(MessageRegistry::new)
    }

    /// Enter `T` under its tag. Idempotent per tag.
    pub fn register<T>(&self)
    where
        T: Message + Serialize + DeserializeOwned,
    {
        self.entries
            .entry(T::MESSAGE_TYPE)
            .or_insert_with(|| RegistryEntry {
                decode: Arc::new(|payload| {
                    let value: T = serde_json::from_value(payload).map_err(|e| {
                        RuntimeError::ProtocolViolation(format!(
                            "payload for tag {:?} does not decode: {e}",
                            T::MESSAGE_TYPE
                        ))
                    })?;
                    Ok(AnyMessage::new(value))
                }),
            });
    }

    /// Whether a tag has been registered.
    pub fn is_registered(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Encode a value for the wire.
    ///
    /// Fails with [`RuntimeError::UnknownMessageType`] when `T` was never
    /// registered: surfaced synchronously at the send site, because the
    /// receiving peer could not decode it either.
    pub fn serialize<T>(&self, value: &T) -> RtResult<(&'static str, serde_json::Value)>
    where
        T: Message + Serialize,
    {
        if !self.is_registered(T::MESSAGE_TYPE) {
            return Err(RuntimeError::UnknownMessageType(T::MESSAGE_TYPE.to_string()));
        }
        let payload = serde_json::to_value(value).map_err(|e| {
            RuntimeError::ProtocolViolation(format!(
                "value of tag {:?} does not encode: {e}",
                T::MESSAGE_TYPE
            ))
        })?;
        Ok((T::MESSAGE_TYPE, payload))
    }

    /// Decode a payload by tag.
    pub fn deserialize(&self, tag: &str, payload: serde_json::Value) -> RtResult<AnyMessage> {
        let entry = self
            .entries
            .get(tag)
            .ok_or_else(|| RuntimeError::UnknownMessageType(tag.to_string()))?;
        (entry.decode)(payload)
    }
}

/// Register `T` in the global registry. Idempotent; call freely at use
/// sites (tests register-on-use).
pub fn register_message<T>()
where
    T: Message + Serialize + DeserializeOwned,
{
    MessageRegistry::global().register::<T>();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct EchoRequest {
        msg: String,
    }

    impl Message for EchoRequest {
        const MESSAGE_TYPE: &'static str = "registry_test_echo_request";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Unregistered;

    impl Message for Unregistered {
        const MESSAGE_TYPE: &'static str = "registry_test_never_registered";
    }

    #[test]
    fn test_round_trip() {
        register_message::<EchoRequest>();
        let value = EchoRequest { msg: "hi".into() };

        let (tag, payload) = MessageRegistry::global().serialize(&value).unwrap();
        assert_eq!(tag, "registry_test_echo_request");

        let any = MessageRegistry::global().deserialize(tag, payload).unwrap();
        assert_eq!(any.tag(), tag);
        assert_eq!(any.downcast::<EchoRequest>().unwrap(), value);
    }

    #[test]
    fn test_register_is_idempotent() {
        register_message::<EchoRequest>();
        register_message::<EchoRequest>();
        assert!(MessageRegistry::global().is_registered("registry_test_echo_request"));
    }

    #[test]
    fn test_serialize_unregistered_fails() {
        let err = MessageRegistry::global()
            .serialize(&Unregistered)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownMessageType(_)));
    }

    #[test]
    fn test_deserialize_unknown_tag_fails() {
        let err = MessageRegistry::global()
            .deserialize("registry_test_no_such_tag", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownMessageType(_)));
    }

    #[test]
    fn test_deserialize_bad_payload_fails() {
        register_message::<EchoRequest>();
        let err = MessageRegistry::global()
            .deserialize("registry_test_echo_request", serde_json::json!([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ProtocolViolation(_)));
    }

    #[test]
    fn test_downcast_mismatch_returns_self() {
        let any = AnyMessage::new(EchoRequest { msg: "x".into() });
        let back = any.downcast::<Unregistered>().unwrap_err();
        assert_eq!(back.tag(), "registry_test_echo_request");
        assert!(back.is::<EchoRequest>());
    }
}
