//! Pure string functions mapping (kind, entity, target service, attempt) to
//! queue names and routing keys. Nothing here touches the broker — see
//! `topology` for the declarations that use these names.

use crate::entity::EventKind;

pub const EVENT_EXCHANGE: &str = "event.exchange";
pub const DEAD_EVENT_EXCHANGE: &str = "dead.event.exchange";
pub const TASK_EXCHANGE: &str = "task.exchange";
pub const DEAD_TASK_EXCHANGE: &str = "dead.task.exchange";

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_RETRY_DELAY_MS: u64 = 3_000;
pub const QUEUE_MESSAGE_TTL_MS: u64 = 24 * 60 * 60 * 1000;
pub const MAX_QUEUE_LENGTH: u32 = 10_000;
pub const MAX_QUEUE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// `event.{kind}.{entity}.to.{service}`
pub fn event_queue_name(kind: EventKind, entity: &str, service_to: &str) -> String {
    format!("event.{}.{entity}.to.{service_to}", kind.as_str())
}

/// `dead.event.{kind}.{entity}.to.{service}`
pub fn dead_event_queue_name(kind: EventKind, entity: &str, service_to: &str) -> String {
    format!("dead.{}", event_queue_name(kind, entity, service_to))
}

/// `routing.event.{kind}.{entity}.#`
pub fn event_routing_key(kind: EventKind, entity: &str) -> String {
    format!("routing.event.{}.{entity}.#", kind.as_str())
}

/// `dead.routing.{kind}.{entity}.to.{service}`
pub fn dead_event_routing_key(kind: EventKind, entity: &str, service_to: &str) -> String {
    format!("dead.routing.{}.{entity}.to.{service_to}", kind.as_str())
}

/// `task.{action}.{entity}`
pub fn task_queue_name(action: &str, entity: &str) -> String {
    format!("task.{action}.{entity}")
}

/// `routing.task.{action}.{entity}`
pub fn task_routing_key(action: &str, entity: &str) -> String {
    format!("routing.task.{action}.{entity}")
}

/// `dead.task.{action}.{entity}`
pub fn task_dead_queue_name(action: &str, entity: &str) -> String {
    format!("dead.{}", task_queue_name(action, entity))
}

/// `dead.routing.{action}.{entity}`
pub fn task_dead_routing_key(action: &str, entity: &str) -> String {
    format!("dead.routing.{action}.{entity}")
}

/// `event.store`
pub fn event_store_queue_name() -> &'static str {
    "event.store"
}

/// `dead.event.store`
pub fn event_store_dead_queue_name() -> String {
    format!("dead.{}", event_store_queue_name())
}

/// Catch-all binding pattern required on the event-store queue.
pub fn event_store_routing_key() -> &'static str {
    "#"
}

/// `attempt.{n}.{kind}.{entity}.to.{service}`
pub fn attempt_n_queue_name_event(n: u32, kind: EventKind, entity: &str, service_to: &str) -> String {
    format!("attempt.{n}.{}.{entity}.to.{service_to}", kind.as_str())
}

/// `routing.attempt.{n}.{kind}.{entity}.to.{service}`
pub fn attempt_n_routing_key_event(n: u32, kind: EventKind, entity: &str, service_to: &str) -> String {
    format!("routing.attempt.{n}.{}.{entity}.to.{service_to}", kind.as_str())
}

/// `attempt.{n}.{action}.{entity}`
pub fn attempt_n_queue_name_task(n: u32, action: &str, entity: &str) -> String {
    format!("attempt.{n}.{action}.{entity}")
}

/// `routing.attempt.{n}.{action}.{entity}`
pub fn attempt_n_routing_key_task(n: u32, action: &str, entity: &str) -> String {
    format!("routing.attempt.{n}.{action}.{entity}")
}

/// Rewrites an inbound event/task routing key into its n-th attempt routing
/// key: `routing.event.` / `routing.task.` becomes `routing.attempt.{n}.`,
/// and the trailing `#` (event keys only) becomes `to.{service_name}`.
pub fn rewrite_routing_key_to_attempt_n(routing_key: &str, n: u32, service_name: &str) -> String {
    routing_key
        .replacen("routing.event.", &format!("routing.attempt.{n}."), 1)
        .replacen("routing.task.", &format!("routing.attempt.{n}."), 1)
        .replace('#', &format!("to.{service_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_routing_key_has_trailing_wildcard() {
        assert_eq!(
            event_routing_key(EventKind::Create, "user"),
            "routing.event.create.user.#"
        );
    }

    #[test]
    fn event_queue_name_matches_spec_scenario() {
        assert_eq!(
            event_queue_name(EventKind::Update, "user", "svc-b"),
            "event.update.user.to.svc-b"
        );
    }

    #[test]
    fn dead_queue_name_prefixes_main_queue() {
        let main = event_queue_name(EventKind::Update, "user", "svc-b");
        assert_eq!(dead_event_queue_name(EventKind::Update, "user", "svc-b"), format!("dead.{main}"));
    }

    #[test]
    fn attempt_n_round_trips_through_rewrite() {
        for n in 0..MAX_RETRIES {
            let original = event_routing_key(EventKind::Update, "user");
            let rewritten = rewrite_routing_key_to_attempt_n(&original, n, "svc-b");
            assert_eq!(rewritten, attempt_n_routing_key_event(n, EventKind::Update, "user", "svc-b"));
        }
    }

    #[test]
    fn retry_ladder_scenario_3() {
        // spec.md §8 scenario 3: attempt 0, svc-b, update/user.
        let original = event_routing_key(EventKind::Update, "user");
        let rewritten = rewrite_routing_key_to_attempt_n(&original, 0, "svc-b");
        assert_eq!(rewritten, "routing.attempt.0.update.user.to.svc-b");
    }

    #[test]
    fn dead_queue_exhaustion_scenario_4() {
        assert_eq!(
            dead_event_queue_name(EventKind::Update, "user", "svc-b"),
            "dead.event.update.user.to.svc-b"
        );
    }

    #[test]
    fn event_store_binds_with_wildcard() {
        assert_eq!(event_store_queue_name(), "event.store");
        assert_eq!(event_store_routing_key(), "#");
    }

    #[test]
    fn task_names_are_analogous_to_event_names() {
        assert_eq!(task_queue_name("ship", "order"), "task.ship.order");
        assert_eq!(task_routing_key("ship", "order"), "routing.task.ship.order");
        assert_eq!(task_dead_queue_name("ship", "order"), "dead.task.ship.order");
    }
}
