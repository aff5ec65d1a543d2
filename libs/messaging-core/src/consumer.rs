//! The consumer/retry engine (§4.F): a pure decision function over the
//! outcome of decoding + handling one delivery, and an I/O loop that drives
//! it against a `lapin::Consumer`.
//!
//! Grounded in `message/processing.py`'s `process_message`: a `ModelError`
//! decode failure, a `BusinessError`, or an `UnknownError` from the handler
//! are all terminal (ack, never retried); a `TechnicalError` either
//! re-enters the retry ladder or, once attempts are exhausted, is nacked
//! without requeue so the broker's dead-letter binding routes it to the
//! dead queue. The I/O shell follows `apps/projection-worker/src/main.rs`'s
//! consumer loop: `basic_consume` into a `Stream`, ack/nack per delivery.

use crate::entity::{EntityDescriptor, EventKind};
use crate::envelope::{Envelope, ATTEMPT_HEADER};
use crate::error::{BusinessError, HandlerError, ModelError, TechnicalError, UnknownError};
use crate::naming;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions},
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Consumer,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{error, info, warn};

/// The classified result of decoding + handling one delivery. Distinct from
/// `HandlerError` so a decode failure (`ModelError`, before the handler
/// ever runs) folds into the same decision table as a handler-raised
/// `ModelError`.
pub enum Outcome {
    Success,
    Model(ModelError),
    Business(BusinessError),
    Technical(TechnicalError),
    Unknown(UnknownError),
}

impl From<HandlerError> for Outcome {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Model(e) => Outcome::Model(e),
            HandlerError::Business(e) => Outcome::Business(e),
            HandlerError::Technical(e) => Outcome::Technical(e),
            HandlerError::Unknown(e) => Outcome::Unknown(e),
        }
    }
}

/// What the consumer loop should do with the original delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeAction {
    /// Ack; the outcome is final (success, model/business/unknown error).
    AckTerminal,
    /// Nack without requeue; retries are exhausted and the dead-letter
    /// binding routes the message to its dead queue.
    NackDead,
    /// Ack the original and publish a re-injected copy onto the attempt-n
    /// delay queue, carrying the attempt count this reinjection bumps to.
    Reinject { next_attempt: u32 },
}

/// The pure decision table driving spec.md §8's retry-ladder and
/// dead-letter-on-exhaustion laws. Never touches I/O.
pub fn decide(outcome: &Outcome, attempt: u32, max_retries: u32) -> ConsumeAction {
    match outcome {
        Outcome::Success | Outcome::Model(_) | Outcome::Business(_) | Outcome::Unknown(_) => ConsumeAction::AckTerminal,
        Outcome::Technical(_) => {
            if attempt >= max_retries {
                ConsumeAction::NackDead
            } else {
                ConsumeAction::Reinject { next_attempt: attempt + 1 }
            }
        }
    }
}

fn attempt_from_properties(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| headers.inner().get(ATTEMPT_HEADER))
        .and_then(|value| match value {
            AMQPValue::LongLongInt(n) => Some(*n as u32),
            AMQPValue::LongInt(n) => Some(*n as u32),
            AMQPValue::LongUInt(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(0)
}

/// Renders an AMQP header value as a string for storage in
/// `Envelope::extra_headers`. Returns `None` for value kinds that have no
/// sensible string form (arrays, tables, void, decimals, byte arrays).
fn amqp_value_to_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(s.to_string()),
        AMQPValue::ShortString(s) => Some(s.to_string()),
        AMQPValue::Boolean(b) => Some(b.to_string()),
        AMQPValue::ShortShortInt(n) => Some(n.to_string()),
        AMQPValue::ShortShortUInt(n) => Some(n.to_string()),
        AMQPValue::ShortInt(n) => Some(n.to_string()),
        AMQPValue::ShortUInt(n) => Some(n.to_string()),
        AMQPValue::LongInt(n) => Some(n.to_string()),
        AMQPValue::LongUInt(n) => Some(n.to_string()),
        AMQPValue::LongLongInt(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads every header but `x-attempt` off `properties` into a plain string
/// map, so arbitrary user headers survive a decode/reinject round-trip
/// (§3's "arbitrary user headers permitted").
fn extra_headers_from_properties(properties: &BasicProperties) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(headers) = properties.headers().as_ref() {
        for (key, value) in headers.inner() {
            if key.as_str() == ATTEMPT_HEADER {
                continue;
            }
            if let Some(s) = amqp_value_to_string(value) {
                out.insert(key.to_string(), s);
            }
        }
    }
    out
}

/// Builds the header table for a publish/reinject: `x-attempt` plus every
/// preserved user header.
fn headers_with_extra(attempt: u32, extra_headers: &BTreeMap<String, String>) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(ATTEMPT_HEADER.into(), AMQPValue::LongLongInt(attempt as i64));
    for (key, value) in extra_headers {
        headers.insert(key.as_str().into(), AMQPValue::LongString(value.as_str().into()));
    }
    headers
}

fn envelope_from_delivery(delivery: &Delivery, routing_key: &str) -> Envelope {
    let properties = &delivery.properties;
    Envelope {
        body: delivery.data.clone(),
        app_id: properties.app_id().clone().map(|s| s.to_string()).unwrap_or_default(),
        correlation_id: properties.correlation_id().clone().map(|s| s.to_string()).unwrap_or_default(),
        routing_key: routing_key.to_string(),
        attempt: attempt_from_properties(properties),
        extra_headers: extra_headers_from_properties(properties),
        content_type: properties.content_type().clone().map(|s| s.to_string()),
        content_encoding: properties.content_encoding().clone().map(|s| s.to_string()),
        delivery_mode: *properties.delivery_mode(),
        priority: *properties.priority(),
        message_id: properties.message_id().clone().map(|s| s.to_string()),
        timestamp: *properties.timestamp(),
        message_type: properties.kind().clone().map(|s| s.to_string()),
        user_id: properties.user_id().clone().map(|s| s.to_string()),
        reply_to: properties.reply_to().clone().map(|s| s.to_string()),
        expiration: properties.expiration().clone().map(|s| s.to_string()),
    }
}

fn properties_for_reinject(envelope: &Envelope) -> BasicProperties {
    let mut properties = BasicProperties::default()
        .with_app_id(envelope.app_id.clone().into())
        .with_correlation_id(envelope.correlation_id.clone().into())
        .with_delivery_mode(envelope.delivery_mode.unwrap_or(2));
    if let Some(content_type) = &envelope.content_type {
        properties = properties.with_content_type(content_type.clone().into());
    }
    if let Some(message_type) = &envelope.message_type {
        properties = properties.with_type(message_type.clone().into());
    }

    properties.with_headers(headers_with_extra(envelope.attempt, &envelope.extra_headers))
}

/// Consumes deliveries from `consumer` until the stream ends, handling each
/// one with `handler` and applying `decide`'s verdict. `kind`/`entity` are
/// needed to rebuild the queue's binding routing key for reconstructing the
/// envelope from a raw delivery (lapin exposes the message's properties but
/// not the binding key it arrived on). `descriptor` is `entity`'s contract:
/// every decoded payload is validated against its `kind` shape (§4.B) before
/// the handler ever sees it, per §4.C's "validate against the target shape"
/// decode step.
pub async fn run_consumer<F, Fut>(
    mut consumer: Consumer,
    channel: Channel,
    service_name: &str,
    kind: EventKind,
    entity: &str,
    descriptor: &EntityDescriptor,
    max_retries: u32,
    handler: F,
) where
    F: Fn(Value) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    let routing_key = naming::event_routing_key(kind, entity);

    while let Some(delivery_result) = consumer.next().await {
        let delivery = match delivery_result {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(%err, "error receiving delivery");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        let envelope = envelope_from_delivery(&delivery, &routing_key);
        let outcome = match envelope.decode_and_validate(descriptor, kind) {
            Ok(payload) => match handler(payload).await {
                Ok(()) => Outcome::Success,
                Err(err) => Outcome::from(err),
            },
            Err(model_err) => Outcome::Model(model_err),
        };

        match decide(&outcome, envelope.attempt, max_retries) {
            ConsumeAction::AckTerminal => {
                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    error!(%err, "failed to ack delivery");
                }
            }
            ConsumeAction::NackDead => {
                warn!(correlation_id = %envelope.correlation_id, attempt = envelope.attempt, "retries exhausted, routing to dead queue");
                if let Err(err) = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await {
                    error!(%err, "failed to nack delivery");
                }
            }
            ConsumeAction::Reinject { next_attempt } => {
                let ladder_index = next_attempt - 1;
                let retry_routing_key = naming::rewrite_routing_key_to_attempt_n(&routing_key, ladder_index, service_name);
                let retried = envelope.reinject(next_attempt, retry_routing_key.clone());
                let properties = properties_for_reinject(&retried);

                match channel
                    .basic_publish(naming::EVENT_EXCHANGE, &retry_routing_key, BasicPublishOptions::default(), &retried.body, properties)
                    .await
                {
                    Ok(confirm) => {
                        if let Err(err) = confirm.await {
                            error!(%err, "publish confirmation failed for reinjected message");
                        }
                    }
                    Err(err) => error!(%err, "failed to publish reinjected message"),
                }

                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    error!(%err, "failed to ack original delivery after reinjection");
                }
                info!(correlation_id = %envelope.correlation_id, next_attempt, "message reinjected into retry ladder");
            }
        }
    }
    warn!("consumer stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_acked() {
        assert_eq!(decide(&Outcome::Success, 0, 3), ConsumeAction::AckTerminal);
    }

    #[test]
    fn model_error_is_acked_never_retried() {
        assert_eq!(decide(&Outcome::Model(ModelError::NotAnObject), 0, 3), ConsumeAction::AckTerminal);
    }

    #[test]
    fn business_error_is_acked() {
        assert_eq!(decide(&Outcome::Business(BusinessError("rejected".into())), 1, 3), ConsumeAction::AckTerminal);
    }

    #[test]
    fn unknown_error_is_acked_to_avoid_poison_loop() {
        assert_eq!(decide(&Outcome::Unknown(UnknownError("boom".into())), 0, 3), ConsumeAction::AckTerminal);
    }

    #[test]
    fn technical_error_reinjects_while_attempts_remain_scenario_3() {
        let action = decide(&Outcome::Technical(TechnicalError("timeout".into())), 0, naming::MAX_RETRIES);
        assert_eq!(action, ConsumeAction::Reinject { next_attempt: 1 });
    }

    #[test]
    fn technical_error_reinjects_on_penultimate_attempt() {
        let action = decide(&Outcome::Technical(TechnicalError("timeout".into())), 2, 3);
        assert_eq!(action, ConsumeAction::Reinject { next_attempt: 3 });
    }

    #[test]
    fn technical_error_dead_letters_once_exhausted_scenario_4() {
        let action = decide(&Outcome::Technical(TechnicalError("timeout".into())), 3, naming::MAX_RETRIES);
        assert_eq!(action, ConsumeAction::NackDead);
    }

    #[test]
    fn headers_with_extra_preserves_user_headers_alongside_attempt() {
        let mut extra = BTreeMap::new();
        extra.insert("x-tenant".to_string(), "acme".to_string());
        let headers = headers_with_extra(2, &extra);

        assert_eq!(headers.inner().get(ATTEMPT_HEADER), Some(&AMQPValue::LongLongInt(2)));
        assert_eq!(
            headers.inner().get("x-tenant"),
            Some(&AMQPValue::LongString("acme".into()))
        );
    }

    #[test]
    fn extra_headers_from_properties_excludes_attempt_header() {
        let mut table = FieldTable::default();
        table.insert(ATTEMPT_HEADER.into(), AMQPValue::LongLongInt(1));
        table.insert("x-tenant".into(), AMQPValue::LongString("acme".into()));
        let properties = BasicProperties::default().with_headers(table);

        let extra = extra_headers_from_properties(&properties);
        assert_eq!(extra.get("x-tenant"), Some(&"acme".to_string()));
        assert!(!extra.contains_key(ATTEMPT_HEADER));
    }
}
