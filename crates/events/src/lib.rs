//! A single typed event bus with topic constants (spec §4.I, design note
//! "a single, typed event bus ... each component publishes, it does not
//! maintain its own subscriber list"), replacing the source's per-component
//! callback arrays.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Topic namespaces. Concrete topics are `stream_created`, `stream_closed`,
/// `stream_failed`, `pipeline_registered`, `pipeline_unregistered`,
/// `quality_change`, and `connected` (the WS greeting event, spec §4.I).
pub mod topics {
    pub const STREAM_CREATED: &str = "stream_created";
    pub const STREAM_CLOSED: &str = "stream_closed";
    pub const STREAM_FAILED: &str = "stream_failed";
    pub const PIPELINE_REGISTERED: &str = "pipeline_registered";
    pub const PIPELINE_UNREGISTERED: &str = "pipeline_unregistered";
    pub const QUALITY_CHANGE: &str = "quality_change";
    pub const CONNECTED: &str = "connected";
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
    pub ts: i64,
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Best-effort, in-process publish/subscribe bus. No persistence: a
/// subscriber that wasn't listening when an event fired never sees it
/// (spec §4.I).
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    handlers: Mutex<Vec<(String, Handler)>>,
    last_by_topic: Mutex<HashMap<String, Event>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, handlers: Mutex::new(Vec::new()), last_by_topic: Mutex::new(HashMap::new()) }
    }

    /// The most recently published event on one topic, if any. Used by
    /// late subscribers (and tests) that need the current value of a
    /// topic rather than only future events (SPEC_FULL.md §11: "Event bus
    /// replay snapshot").
    pub fn last(&self, topic: &str) -> Option<Event> {
        self.last_by_topic.lock().get(topic).cloned()
    }

    /// Every topic's most recently published event, keyed by topic. The
    /// WS status channel's `connected` greeting composes this with live
    /// stream/pipeline state rather than replacing it — this snapshot only
    /// covers what actually flowed through the bus.
    pub fn snapshot(&self) -> Vec<Event> {
        self.last_by_topic.lock().values().cloned().collect()
    }

    /// Subscribe for a broadcast-style receiver (used by the Control API's
    /// WebSocket bridge to forward every event to connected clients).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Registers a synchronous, in-process handler for one exact topic.
    /// Handlers for the same topic are invoked sequentially in registration
    /// order; a panicking handler is isolated and does not prevent later
    /// handlers (same topic or others) from running, matching spec §4.I
    /// "errors isolated".
    pub fn on(&self, topic: impl Into<String>, handler: Handler) {
        self.handlers.lock().push((topic.into(), handler));
    }

    pub fn publish(&self, topic: &str, payload: Value, ts: i64) {
        let event = Event { topic: topic.to_string(), payload, ts };
        self.last_by_topic.lock().insert(topic.to_string(), event.clone());
        // Broadcast first so subscribers see events in genuine publish
        // order even if a handler panics below.
        let _ = self.sender.send(event.clone());

        let handlers: Vec<Handler> = {
            let guard = self.handlers.lock();
            guard.iter().filter(|(t, _)| t == topic).map(|(_, h)| h.clone()).collect()
        };
        for handler in handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                tracing::error!(topic = %event.topic, "event handler panicked; isolated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(topics::STREAM_CREATED, Value::Null, 1);
        bus.publish(topics::STREAM_CLOSED, Value::Null, 2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.topic, topics::STREAM_CREATED);
        assert_eq!(second.topic, topics::STREAM_CLOSED);
    }

    #[test]
    fn snapshot_keeps_only_the_latest_event_per_topic() {
        let bus = EventBus::new(16);
        bus.publish(topics::PIPELINE_REGISTERED, serde_json::json!({"name": "Pα"}), 1);
        bus.publish(topics::PIPELINE_REGISTERED, serde_json::json!({"name": "Pβ"}), 2);
        bus.publish(topics::STREAM_CREATED, Value::Null, 3);
        let snapshot = bus.snapshot();
        assert_eq!(snapshot.len(), 2);
        let latest = bus.last(topics::PIPELINE_REGISTERED).unwrap();
        assert_eq!(latest.payload["name"], "Pβ");
    }

    #[test]
    fn a_panicking_handler_does_not_block_others() {
        let bus = EventBus::new(16);
        let calls = Arc::new(Mutex::new(0));
        let calls2 = calls.clone();
        bus.on(topics::QUALITY_CHANGE, Arc::new(|_e: &Event| panic!("boom")));
        bus.on(topics::QUALITY_CHANGE, Arc::new(move |_e: &Event| *calls2.lock() += 1));
        bus.publish(topics::QUALITY_CHANGE, Value::Null, 1);
        assert_eq!(*calls.lock(), 1);
    }
}
