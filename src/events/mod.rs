use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::OrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends without ever failing the caller. Slow or closed channels are logged and dropped.
    pub async fn publish(&self, event: Event, timeout: Duration) {
        let name = event.name();
        match tokio::time::timeout(timeout, self.send(event)).await {
            Ok(Ok(())) => debug!(event = name, "Event published"),
            Ok(Err(e)) => warn!(event = name, error = %e, "Failed to publish event"),
            Err(_) => {
                counter!("fresheats.side_effects.timeouts", 1, "kind" => "event");
                warn!(event = name, "Timed out publishing event");
            }
        }
    }
}

/// Domain events published after a core write has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        customer_id: Uuid,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        customer_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        updated_by: Option<String>,
    },
    OrderArchived {
        order_id: Uuid,
        order_number: String,
    },
    RatingSubmitted {
        order_id: Uuid,
        customer_id: Uuid,
        food_ids: Vec<Uuid>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order-created",
            Event::OrderStatusChanged { .. } => "order-status-changed",
            Event::OrderArchived { .. } => "order-archived",
            Event::RatingSubmitted { .. } => "rating-submitted",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            Event::OrderCreated { order_id, .. }
            | Event::OrderStatusChanged { order_id, .. }
            | Event::OrderArchived { order_id, .. }
            | Event::RatingSubmitted { order_id, .. } => *order_id,
        }
    }
}

/// What real-time consumers receive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn wrap(event: &Event) -> Self {
        Self {
            event: event.name().to_string(),
            payload: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            emitted_at: Utc::now(),
        }
    }
}

/// Fan-out point for socket gateways and other live subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the envelope.
    pub fn broadcast(&self, envelope: EventEnvelope) -> usize {
        self.sender.send(envelope).unwrap_or(0)
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, hub: EventHub) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!(event = event.name(), order_id = %event.order_id(), "Received event");
        let delivered = hub.broadcast(EventEnvelope::wrap(&event));
        debug!(event = event.name(), subscribers = delivered, "Event broadcast");
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn created() -> Event {
        Event::OrderCreated {
            order_id: Uuid::new_v4(),
            order_number: "ORD-2025-000001".into(),
            customer_id: Uuid::new_v4(),
            total_amount: dec!(292.50),
        }
    }

    #[test]
    fn payload_is_tagged_with_the_event_name() {
        let envelope = EventEnvelope::wrap(&created());
        assert_eq!(envelope.event, "order-created");
        assert_eq!(envelope.payload["event"], "order-created");
        assert_eq!(envelope.payload["order_number"], "ORD-2025-000001");
    }

    #[tokio::test]
    async fn processed_events_reach_subscribers() {
        let (tx, rx) = mpsc::channel(8);
        let hub = EventHub::new(8);
        let mut live = hub.subscribe();
        let worker = tokio::spawn(process_events(rx, hub));

        let sender = EventSender::new(tx);
        sender.publish(created(), Duration::from_secs(1)).await;
        drop(sender);

        let envelope = live.recv().await.unwrap();
        assert_eq!(envelope.event, "order-created");
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn publishing_to_a_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSender::new(tx)
            .publish(created(), Duration::from_millis(50))
            .await;
    }
}
