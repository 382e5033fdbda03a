//! In-process notifications about the particle store.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a lagging subscriber loses the oldest envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

pub mod topics;

pub use topics::Topic;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub time: DateTime<Utc>,
    pub topic: Topic,
    pub payload: Value,
}

#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    /// `capacity` envelopes are retained per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn publish(&self, topic: Topic, payload: Value) {
        let envelope = Envelope {
            time: Utc::now(),
            topic,
            payload,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(target: "pps::events", %topic, "no subscribers");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_envelopes() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let before = Utc::now();
        bus.publish(Topic::StoreFailed, json!({"op": "save_group"}));
        let env = rx.recv().await.unwrap();
        assert_eq!(env.topic, Topic::StoreFailed);
        assert_eq!(env.payload["op"], "save_group");
        assert!(env.time >= before);
    }

    #[test]
    fn envelope_serializes_topic_by_wire_name() {
        let env = Envelope {
            time: Utc::now(),
            topic: Topic::RecordEvicted,
            payload: json!({"owner": "x"}),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["topic"], "record.evicted");
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = Bus::default();
        assert_eq!(bus.receiver_count(), 0);
        bus.publish(Topic::RecordLoaded, json!({}));
    }

    #[test]
    fn lagging_subscriber_keeps_the_newest() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for n in 0..4 {
            bus.publish(Topic::RecordLoaded, json!({ "n": n }));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(2))
        ));
        assert_eq!(rx.try_recv().unwrap().payload["n"], 2);
        assert_eq!(rx.try_recv().unwrap().payload["n"], 3);
    }
}
