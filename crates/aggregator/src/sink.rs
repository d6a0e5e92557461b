use async_trait::async_trait;
use common::AggregationBucket;

/// What the aggregator hands off once a bucket's debounce window
/// closes: the orchestrator turns this into a `NotificationHistory` row
/// and dispatches it to channel workers.
#[async_trait]
pub trait FlushSink: Send + Sync {
    async fn flush(&self, bucket: AggregationBucket);
}
