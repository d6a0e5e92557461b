pub mod api;
pub mod config;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use routes::create_route;
pub use state::AppState;

use aggregator::AggregationEngine;
use channels::{ChannelProviderConfig, ChannelWorkerPool, EmailChannel, HttpChannelProvider, PushChannel, SmsChannel, WorkerPoolConfig};
use common::ChannelKind;
use orchestrator::{DeliveryOrchestrator, FallbackQueueJanitor, FallbackReplayWorker};
use std::collections::HashMap;
use std::sync::Arc;
use store::{PgFallbackQueueStore, PgNotificationHistoryStore, PgPreferenceStore};

const PRIORITY_TOPICS: [&str; 3] = ["notifications.high", "notifications.normal", "notifications.low"];

/// Assembles every subsystem from environment configuration and runs the
/// engine until the process is killed: background consumers, the
/// fallback replay worker, the janitor, and the operator HTTP surface.
pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::AppConfig::from_env();

    let store_config = store::StoreConfig::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(store_config.max_connections)
        .connect(&store_config.database_url)
        .await?;

    let preferences: Arc<dyn store::PreferenceStore> = Arc::new(PgPreferenceStore::new(pool.clone()));
    let history: Arc<dyn store::NotificationHistoryStore> = Arc::new(PgNotificationHistoryStore::new(pool.clone()));
    let fallback_queue: Arc<dyn store::FallbackQueueStore> = Arc::new(PgFallbackQueueStore::new(pool));

    let mut channel_pools: HashMap<ChannelKind, Arc<ChannelWorkerPool>> = HashMap::new();
    let pool_config = WorkerPoolConfig::default();

    let push_provider = HttpChannelProvider::new(ChannelProviderConfig::from_env(ChannelKind::Push)?)?;
    channel_pools.insert(ChannelKind::Push, Arc::new(ChannelWorkerPool::spawn(Arc::new(PushChannel::new(push_provider)), pool_config)));

    let email_provider = HttpChannelProvider::new(ChannelProviderConfig::from_env(ChannelKind::Email)?)?;
    channel_pools.insert(ChannelKind::Email, Arc::new(ChannelWorkerPool::spawn(Arc::new(EmailChannel::new(email_provider)), pool_config)));

    let sms_provider = HttpChannelProvider::new(ChannelProviderConfig::from_env(ChannelKind::Sms)?)?;
    channel_pools.insert(ChannelKind::Sms, Arc::new(ChannelWorkerPool::spawn(Arc::new(SmsChannel::new(sms_provider)), pool_config)));

    let delivery_orchestrator = Arc::new(DeliveryOrchestrator::new(preferences.clone(), history.clone(), channel_pools));

    let aggregation_engine = Arc::new(AggregationEngine::new(config.aggregation_shards, delivery_orchestrator));

    let since = chrono::Utc::now() - chrono::Duration::days(1);
    match aggregator::rebuild_from_history(aggregation_engine.as_ref(), history.as_ref(), since).await {
        Ok(restored) => tracing::info!("restored {} in-flight aggregation buckets", restored),
        Err(e) => tracing::warn!("failed to rebuild aggregation state from history: {}", e),
    }

    let bus_config = bus::BusConfig::from_env()?;
    let event_bus = Arc::new(bus::KafkaEventBus::new(bus_config).await?);

    let state = AppState {
        preferences,
        history,
        fallback_queue: fallback_queue.clone(),
        aggregation_engine,
        bus: event_bus.clone(),
    };

    for topic in PRIORITY_TOPICS {
        api::subscribe_topic(&state, topic).await?;
    }

    Arc::new(FallbackReplayWorker::new(fallback_queue.clone(), event_bus)).spawn();
    Arc::new(FallbackQueueJanitor::new(fallback_queue)).spawn();

    let app = routes::create_route(state);
    let listener = tokio::net::TcpListener::bind(config.listen_address()).await?;
    tracing::info!("engine listening on {}", config.listen_address());
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
