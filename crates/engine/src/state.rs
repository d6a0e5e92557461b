use aggregator::AggregationEngine;
use orchestrator::DeliveryOrchestrator;
use std::sync::Arc;
use store::{FallbackQueueStore, NotificationHistoryStore, PreferenceStore};

/// Shared application state, handed to both the HTTP layer and the
/// background consumer/replay/janitor tasks: a small bag of `Arc`-wrapped
/// collaborators rather than a god object.
#[derive(Clone)]
pub struct AppState {
    pub preferences: Arc<dyn PreferenceStore>,
    pub history: Arc<dyn NotificationHistoryStore>,
    pub fallback_queue: Arc<dyn FallbackQueueStore>,
    pub aggregation_engine: Arc<AggregationEngine<DeliveryOrchestrator>>,
    pub bus: Arc<bus::KafkaEventBus>,
}
