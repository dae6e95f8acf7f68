//! Wire envelope: the self-describing JSON record wrapping every remote
//! message.
//!
//! All fields are stable; decoders ignore unknown fields, so peers can
//! evolve independently. Every constructed envelope stamps the current
//! wall-clock milliseconds.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::util::CorrelationId;

/// Envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeKind {
    UserMessage,
    SystemMessage,
    AskRequest,
    AskResponse,
    Handshake,
    Heartbeat,
}

/// One frame's payload on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub kind: EnvelopeKind,
    pub target_path: String,
    pub message_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    pub timestamp_ms: i64,
}

/// Handshake payload: who is on the other end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub system: String,
    pub address: String,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl WireEnvelope {
    /// A fire-and-forget user message.
    pub fn user(
        target_path: String,
        message_type: &str,
        payload: Value,
        sender_path: Option<String>,
    ) -> Self {
        Self {
            kind: EnvelopeKind::UserMessage,
            target_path,
            message_type: message_type.to_string(),
            payload,
            sender_path,
            correlation_id: None,
            timestamp_ms: now_millis(),
        }
    }

    /// A kernel-level instruction for the target actor.
    pub fn system(target_path: String, message_type: &str) -> Self {
        Self {
            kind: EnvelopeKind::SystemMessage,
            target_path,
            message_type: message_type.to_string(),
            payload: Value::Object(serde_json::Map::new()),
            sender_path: None,
            correlation_id: None,
            timestamp_ms: now_millis(),
        }
    }

    /// The request half of a remote ask.
    pub fn ask_request(
        target_path: String,
        message_type: &str,
        payload: Value,
        correlation_id: CorrelationId,
        sender_path: String,
    ) -> Self {
        Self {
            kind: EnvelopeKind::AskRequest,
            target_path,
            message_type: message_type.to_string(),
            payload,
            sender_path: Some(sender_path),
            correlation_id: Some(correlation_id),
            timestamp_ms: now_millis(),
        }
    }

    /// The response half of a remote ask, echoing the correlation id.
    pub fn ask_response(
        target_path: String,
        message_type: &str,
        payload: Value,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            kind: EnvelopeKind::AskResponse,
            target_path,
            message_type: message_type.to_string(),
            payload,
            sender_path: None,
            correlation_id: Some(correlation_id),
            timestamp_ms: now_millis(),
        }
    }

    /// The identity exchange that opens every connection.
    pub fn handshake(system: &str, address: String) -> Self {
        let payload = serde_json::json!({ "system": system, "address": address });
        Self {
            kind: EnvelopeKind::Handshake,
            target_path: String::new(),
            message_type: "handshake".to_string(),
            payload,
            sender_path: None,
            correlation_id: None,
            timestamp_ms: now_millis(),
        }
    }

    /// Keep-alive probe; any received frame also counts as liveness.
    pub fn heartbeat() -> Self {
        Self {
            kind: EnvelopeKind::Heartbeat,
            target_path: String::new(),
            message_type: "heartbeat".to_string(),
            payload: Value::Object(serde_json::Map::new()),
            sender_path: None,
            correlation_id: None,
            timestamp_ms: now_millis(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&EnvelopeKind::UserMessage).unwrap(),
            "\"USER_MESSAGE\""
        );
        assert_eq!(
            serde_json::to_string(&EnvelopeKind::AskRequest).unwrap(),
            "\"ASK_REQUEST\""
        );
        assert_eq!(
            serde_json::to_string(&EnvelopeKind::Heartbeat).unwrap(),
            "\"HEARTBEAT\""
        );
    }

    #[test]
    fn test_user_envelope_round_trip() {
        let env = WireEnvelope::user(
            "movie.tcp://server@127.0.0.1:9001/user/echo".to_string(),
            "EchoRequest",
            serde_json::json!({ "msg": "hi" }),
            Some("movie.tcp://client@127.0.0.1:9002/user".to_string()),
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: WireEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_ask_pair_shares_correlation() {
        let correlation_id = CorrelationId::new();
        let request = WireEnvelope::ask_request(
            "/user/echo".to_string(),
            "EchoRequest",
            serde_json::json!({}),
            correlation_id,
            "/temp/ask-1".to_string(),
        );
        let response = WireEnvelope::ask_response(
            "/temp/ask-1".to_string(),
            "EchoResponse",
            serde_json::json!({}),
            correlation_id,
        );
        assert_eq!(request.correlation_id, response.correlation_id);
        assert_eq!(request.kind, EnvelopeKind::AskRequest);
        assert_eq!(response.kind, EnvelopeKind::AskResponse);
    }

    #[test]
    fn test_timestamp_is_stamped() {
        let before = now_millis();
        let env = WireEnvelope::heartbeat();
        let after = now_millis();
        assert!(env.timestamp_ms >= before && env.timestamp_ms <= after);
    }

    #[test]
    fn test_unknown_fields_ignored_on_decode() {
        let json = r#"{
            "kind": "USER_MESSAGE",
            "target_path": "/user/echo",
            "message_type": "EchoRequest",
            "payload": {},
            "timestamp_ms": 1700000000000,
            "some_future_field": {"nested": true}
        }"#;
        let env: WireEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.kind, EnvelopeKind::UserMessage);
        assert_eq!(env.sender_path, None);
    }

    #[test]
    fn test_handshake_payload_schema() {
        let env = WireEnvelope::handshake("server", "movie.tcp://server@127.0.0.1:9001".into());
        let payload: HandshakePayload = serde_json::from_value(env.payload).unwrap();
        assert_eq!(payload.system, "server");
        assert_eq!(payload.address, "movie.tcp://server@127.0.0.1:9001");
    }
}
