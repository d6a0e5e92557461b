use bus::NotificationEventBus;
use common::{calculate_backoff, EventEnvelope, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use store::FallbackQueueStore;
use tracing::{debug, error, info, warn};

/// How often the replay worker polls the fallback queue for work.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const BATCH_SIZE: i64 = 50;

/// Replays entries parked in the fallback queue back onto the event bus.
/// An entry lands here when the bus could not durably accept a publish;
/// this worker is what gives the producer side an eventual-delivery
/// guarantee without blocking the original caller.
pub struct FallbackReplayWorker<B: NotificationEventBus + 'static> {
    store: Arc<dyn FallbackQueueStore>,
    bus: Arc<B>,
    retry_config: RetryConfig,
}

impl<B: NotificationEventBus + 'static> FallbackReplayWorker<B> {
    pub fn new(store: Arc<dyn FallbackQueueStore>, bus: Arc<B>) -> Self {
        Self { store, bus, retry_config: RetryConfig::default() }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.process_batch().await {
                    error!("fallback replay batch failed: {}", e);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
    }

    async fn process_batch(&self) -> Result<(), common::StoreError> {
        let entries = self.store.claim_batch(BATCH_SIZE).await?;
        if entries.is_empty() {
            return Ok(());
        }

        info!("replaying {} fallback queue entries", entries.len());

        for entry in entries {
            let backoff = calculate_backoff(entry.retry_count, &self.retry_config);
            if let Some(last_retry) = entry.last_retry_at {
                let elapsed = chrono::Utc::now().signed_duration_since(last_retry);
                if elapsed.to_std().map(|d| d < backoff).unwrap_or(false) {
                    debug!("entry {} not yet due for retry", entry.id);
                    continue;
                }
            }

            let envelope: Result<EventEnvelope, _> = serde_json::from_value(entry.event_data.clone());
            let envelope = match envelope {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!("fallback entry {} has unparseable event data: {}", entry.id, e);
                    self.store.record_failure(entry.id, format!("unparseable payload: {e}"), chrono::Utc::now()).await?;
                    continue;
                }
            };

            match self.bus.publish(envelope).await {
                Ok(()) => {
                    self.store.mark_processed(entry.id, chrono::Utc::now()).await?;
                }
                Err(e) => {
                    warn!("replay of fallback entry {} failed: {}", entry.id, e);
                    self.store.record_failure(entry.id, e.to_string(), chrono::Utc::now()).await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::InMemoryEventBus;
    use common::{Event, EventPayload, FallbackQueueEntry, Priority, TargetKind, TargetRef};
    use store::InMemoryFallbackQueueStore;

    fn sample_envelope() -> EventEnvelope {
        EventEnvelope::new(Event {
            event_id: uuid::Uuid::new_v4(),
            priority: Priority::Normal,
            actor_id: "actor-1".to_string(),
            target_user_id: "user-1".to_string(),
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            payload: EventPayload::Like { post_id: "post-1".to_string() },
            extra: Default::default(),
            occurred_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn successful_replay_marks_entry_processed() {
        let store: Arc<dyn FallbackQueueStore> = Arc::new(InMemoryFallbackQueueStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let worker = FallbackReplayWorker::new(store.clone(), bus.clone());

        let envelope = sample_envelope();
        let entry = FallbackQueueEntry::new(serde_json::to_value(&envelope).unwrap(), envelope.topic(), envelope.event.target_user_id.clone());
        store.insert(entry).await.unwrap();

        worker.process_batch().await.unwrap();

        assert_eq!(bus.queued(envelope.topic()).await.len(), 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending_count, 0);
    }
}
