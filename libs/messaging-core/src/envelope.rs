//! Serialize/deserialize a JSON payload into a broker message, and carry the
//! standard headers + correlation identifier (§3, §4.C).

use crate::entity::{EntityDescriptor, EventKind};
use crate::error::ModelError;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const ATTEMPT_HEADER: &str = "x-attempt";
pub const EVENT_NAME_FIELD: &str = "event_name";

/// A broker-agnostic message. Adapters translate this to/from
/// `lapin::BasicProperties`/`lapin::message::Delivery`; nothing in this
/// type depends on lapin, so the codec and retry decision logic are
/// testable without a broker.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub body: Vec<u8>,
    pub app_id: String,
    pub correlation_id: String,
    pub routing_key: String,
    pub attempt: u32,
    pub extra_headers: BTreeMap<String, String>,

    // AMQP passthrough fields preserved verbatim across a retry reinjection
    // (§4.F re-injection semantics).
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
}

impl Envelope {
    /// Builds a fresh envelope for a first publish: `x-attempt = 0`, a new
    /// correlation id unless one is supplied.
    pub fn new_event(
        payload: &Value,
        app_id: &str,
        routing_key: String,
        correlation_id: Option<String>,
    ) -> Result<Self, ModelError> {
        let body = encode_payload(payload)?;
        Ok(Self {
            body,
            app_id: app_id.to_string(),
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            routing_key,
            attempt: 0,
            extra_headers: BTreeMap::new(),
            content_type: Some("application/json".to_string()),
            content_encoding: None,
            delivery_mode: Some(2),
            priority: None,
            message_id: None,
            timestamp: None,
            message_type: None,
            user_id: None,
            reply_to: None,
            expiration: None,
        })
    }

    /// Decodes the body back to JSON, rejecting non-object payloads.
    pub fn decode_payload(&self) -> Result<Value, ModelError> {
        decode_payload(&self.body)
    }

    /// Decodes the body, then validates it against `descriptor`'s shape for
    /// `kind` (§4.B's Create/Update/Delete/Read validators; `notify`
    /// payloads are opaque and always pass). This is the decode step §4.C
    /// requires: "validate against the target shape from 4.B; on failure
    /// raise a model error".
    pub fn decode_and_validate(&self, descriptor: &EntityDescriptor, kind: EventKind) -> Result<Value, ModelError> {
        let payload = self.decode_payload()?;
        descriptor.validate(kind, &payload)?;
        Ok(payload)
    }

    /// Produces the envelope republished for a retry attempt: same body and
    /// correlation id, `x-attempt` incremented, routing key swapped to the
    /// attempt-n queue's routing key. Every other passthrough field is
    /// copied verbatim.
    pub fn reinject(&self, next_attempt: u32, routing_key: String) -> Self {
        Self {
            body: self.body.clone(),
            app_id: self.app_id.clone(),
            correlation_id: self.correlation_id.clone(),
            routing_key,
            attempt: next_attempt,
            extra_headers: self.extra_headers.clone(),
            content_type: self.content_type.clone(),
            content_encoding: self.content_encoding.clone(),
            delivery_mode: self.delivery_mode,
            priority: self.priority,
            message_id: self.message_id.clone(),
            timestamp: self.timestamp,
            message_type: self.message_type.clone(),
            user_id: self.user_id.clone(),
            reply_to: self.reply_to.clone(),
            expiration: self.expiration.clone(),
        }
    }

    pub fn is_correlation_id_valid_uuidv4(&self) -> bool {
        Uuid::parse_str(&self.correlation_id)
            .map(|u| u.get_version_num() == 4)
            .unwrap_or(false)
    }
}

pub fn encode_payload(payload: &Value) -> Result<Vec<u8>, ModelError> {
    if !payload.is_object() {
        return Err(ModelError::NotAnObject);
    }
    Ok(serde_json::to_vec(payload)?)
}

pub fn decode_payload(body: &[u8]) -> Result<Value, ModelError> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(ModelError::NotAnObject);
    }
    Ok(value)
}

/// Injects `event_name` into a notify payload before encoding, per §4.C.
pub fn inject_event_name(payload: &mut Value, event_name: &str) -> Result<(), ModelError> {
    let obj = payload.as_object_mut().ok_or(ModelError::NotAnObject)?;
    obj.insert(EVENT_NAME_FIELD.to_string(), Value::String(event_name.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_create_event_envelope_scenario_2() {
        let payload = json!({"user_id": 7, "username": "alice"});
        let envelope = Envelope::new_event(
            &payload,
            "svc-a",
            "routing.event.create.user.#".to_string(),
            None,
        )
        .unwrap();

        assert_eq!(envelope.attempt, 0);
        assert_eq!(envelope.app_id, "svc-a");
        assert_eq!(envelope.routing_key, "routing.event.create.user.#");
        assert!(envelope.is_correlation_id_valid_uuidv4());
        assert_eq!(envelope.decode_payload().unwrap(), payload);
    }

    #[test]
    fn reinject_preserves_body_and_correlation_bumps_attempt() {
        let payload = json!({"user_id": 7});
        let original = Envelope::new_event(&payload, "svc-a", "routing.event.update.user.#".into(), None).unwrap();
        let retried = original.reinject(1, "routing.attempt.0.update.user.to.svc-b".to_string());

        assert_eq!(retried.body, original.body);
        assert_eq!(retried.correlation_id, original.correlation_id);
        assert_eq!(retried.attempt, original.attempt + 1);
        assert_eq!(retried.routing_key, "routing.attempt.0.update.user.to.svc-b");
    }

    #[test]
    fn decode_and_validate_rejects_update_missing_event_key() {
        use crate::entity::{EntityDescriptor, FieldDescriptor};

        let descriptor = EntityDescriptor::new(
            "user",
            vec![FieldDescriptor::event_key("user_id"), FieldDescriptor::new("username")],
        )
        .unwrap();
        let envelope = Envelope::new_event(&json!({"username": "alice"}), "svc-a", "routing.event.update.user.#".into(), None).unwrap();

        let err = envelope.decode_and_validate(&descriptor, EventKind::Update).unwrap_err();
        assert!(matches!(err, ModelError::MissingField(field) if field == "user_id"));
    }

    #[test]
    fn decode_and_validate_accepts_well_formed_update() {
        use crate::entity::{EntityDescriptor, FieldDescriptor};

        let descriptor = EntityDescriptor::new(
            "user",
            vec![FieldDescriptor::event_key("user_id"), FieldDescriptor::new("username")],
        )
        .unwrap();
        let payload = json!({"user_id": 7});
        let envelope = Envelope::new_event(&payload, "svc-a", "routing.event.update.user.#".into(), None).unwrap();

        assert_eq!(envelope.decode_and_validate(&descriptor, EventKind::Update).unwrap(), payload);
    }

    #[test]
    fn notify_injects_event_name() {
        let mut payload = json!({"ok": true});
        inject_event_name(&mut payload, "order_shipped").unwrap();
        assert_eq!(payload["event_name"], "order_shipped");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = decode_payload(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, ModelError::NotAnObject));
    }

    #[test]
    fn malformed_json_is_a_model_error() {
        let err = decode_payload(b"{not json").unwrap_err();
        assert!(matches!(err, ModelError::InvalidJson(_)));
    }
}
