use crate::trait_def::{NotificationEventBus, ProcessingResult};
use common::{EventBusError, EventEnvelope};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory stand-in for [`crate::KafkaEventBus`], used in unit and
/// integration tests instead of a live broker. `publish` appends to a
/// per-topic queue; `subscribe` drains it on an interval.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    topics: Arc<Mutex<std::collections::HashMap<String, Vec<EventEnvelope>>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn queued(&self, topic: &str) -> Vec<EventEnvelope> {
        self.topics.lock().await.get(topic).cloned().unwrap_or_default()
    }
}

impl NotificationEventBus for InMemoryEventBus {
    type Error = EventBusError;

    async fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error> {
        let topic = envelope.topic().to_string();
        self.topics.lock().await.entry(topic).or_default().push(envelope);
        Ok(())
    }

    async fn subscribe<F>(&self, topic: &str, _group_suffix: &str, handler: F) -> Result<(), Self::Error>
    where
        F: Fn(EventEnvelope) -> Result<ProcessingResult, Box<dyn Error + Send + Sync>> + Send + Sync + 'static,
    {
        let drained: Vec<EventEnvelope> = {
            let mut topics = self.topics.lock().await;
            topics.remove(topic).unwrap_or_default()
        };
        for envelope in drained {
            let _ = handler(envelope);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Event, EventPayload, Priority, TargetKind, TargetRef};

    fn sample_envelope() -> EventEnvelope {
        EventEnvelope::new(Event {
            event_id: uuid::Uuid::new_v4(),
            priority: Priority::High,
            actor_id: "actor-1".to_string(),
            target_user_id: "user-1".to_string(),
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            payload: EventPayload::Mention { post_id: Some("post-1".to_string()), comment_id: None },
            extra: Default::default(),
            occurred_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn publish_then_subscribe_drains_queue() {
        let bus = InMemoryEventBus::new();
        bus.publish(sample_envelope()).await.unwrap();
        assert_eq!(bus.queued("notifications.high").await.len(), 1);

        let received = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let received_clone = received.clone();
        bus.subscribe("notifications.high", "test", move |_envelope| {
            received_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(ProcessingResult::Success)
        })
        .await
        .unwrap();

        assert_eq!(received.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(bus.queued("notifications.high").await.len(), 0);
    }
}
