use crate::engine::AggregationEngine;
use crate::sink::FlushSink;
use common::{AggregationBucket, AggregationKey};
use store::NotificationHistoryStore;
use tracing::info;

/// Repopulates in-memory bucket state from unread, aggregated history
/// rows after a restart, so a bucket that was still accepting events
/// when the process died keeps accumulating instead of silently
/// resetting. Restored buckets go through [`AggregationEngine::restore`]
/// so each one gets a flush timer, the same as a bucket created by
/// `ingest`.
pub async fn rebuild_from_history<S: FlushSink + 'static>(
    engine: &AggregationEngine<S>,
    history: &dyn NotificationHistoryStore,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<usize, common::StoreError> {
    let rows = history.list_unread_since(since).await?;
    let mut restored = 0;

    for row in rows.into_iter().filter(|r| r.is_aggregated) {
        let key = AggregationKey::new(row.user_id.clone(), row.event_type, row.target_ref.clone());
        let mut bucket = AggregationBucket::new(key.clone(), row.actor_ids.first().cloned().unwrap_or_default(), row.updated_at);
        bucket.first_event_at = row.created_at;
        bucket.last_event_at = row.updated_at;
        bucket.count = row.aggregated_count;
        bucket.actor_ids = row.actor_ids;
        bucket.notification_id = Some(row.id);

        engine.restore(bucket).await;
        restored += 1;
    }

    info!("rebuilt {} aggregation buckets from unread history", restored);
    Ok(restored)
}
