use crate::state::AppState;
use bus::{NotificationEventBus, ProcessingResult};
use common::{Event, EventEnvelope, FallbackQueueEntry, NotificationHistory, NotificationPreference, OrchestratorError};
use store::FallbackQueueStats;
use uuid::Uuid;

/// Publishes `event` to the bus, falling back to the fallback queue if
/// the publish itself fails durably.
pub async fn enqueue_event(state: &AppState, event: Event) -> Result<(), OrchestratorError> {
    let envelope = EventEnvelope::new(event);
    let topic = envelope.topic().to_string();
    let target_user_id = envelope.event.target_user_id.clone();

    match state.bus.publish(envelope.clone()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!("publish failed, parking event {} in fallback queue: {}", envelope.envelope_id, e);
            let event_data = serde_json::to_value(&envelope).map_err(|e| OrchestratorError::Fatal(e.to_string()))?;
            let entry = FallbackQueueEntry::new(event_data, topic, target_user_id);
            state.fallback_queue.insert(entry).await?;
            Ok(())
        }
    }
}

pub async fn list_notifications(state: &AppState, user_id: &str, limit: i64, offset: i64) -> Result<Vec<NotificationHistory>, OrchestratorError> {
    Ok(state.history.list_for_user(user_id, limit, offset).await?)
}

pub async fn mark_read(state: &AppState, notification_id: Uuid) -> Result<(), OrchestratorError> {
    Ok(state.history.mark_read(notification_id, chrono::Utc::now()).await?)
}

pub async fn get_preferences(state: &AppState, user_id: &str) -> Result<NotificationPreference, OrchestratorError> {
    Ok(state.preferences.get(user_id).await?)
}

pub async fn update_preferences(state: &AppState, preference: NotificationPreference) -> Result<(), OrchestratorError> {
    Ok(state.preferences.upsert(preference).await?)
}

pub async fn get_fallback_queue_stats(state: &AppState) -> Result<FallbackQueueStats, OrchestratorError> {
    Ok(state.fallback_queue.stats().await?)
}

/// Wires one priority topic's consumer into the aggregation engine: every
/// envelope that arrives is fed to `ingest`, and the bus offset is
/// committed regardless of aggregation outcome since the history row
/// (not the Kafka topic) is this pipeline's durability boundary past this
/// point.
pub async fn subscribe_topic(state: &AppState, topic: &str) -> Result<(), common::EventBusError> {
    let engine = state.aggregation_engine.clone();
    state
        .bus
        .subscribe(topic, "aggregator", move |envelope: EventEnvelope| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.ingest(envelope.event).await;
            });
            Ok(ProcessingResult::Success)
        })
        .await
}
