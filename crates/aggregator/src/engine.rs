use crate::shard::ShardedBucketStore;
use crate::sink::FlushSink;
use common::{AggregationBucket, AggregationKey, Event};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long a bucket waits after its *last* absorbed event before
/// flushing, independent of the per-type aggregation window. Coalesces
/// bursts (e.g. five likes within a second) into one flush instead of
/// firing on every single event.
pub const DEBOUNCE_DELAY: Duration = Duration::from_secs(30);

pub struct AggregationEngine<S: FlushSink + 'static> {
    shards: Arc<ShardedBucketStore>,
    sink: Arc<S>,
}

impl<S: FlushSink + 'static> AggregationEngine<S> {
    pub fn new(shard_count: usize, sink: Arc<S>) -> Self {
        Self { shards: Arc::new(ShardedBucketStore::new(shard_count)), sink }
    }

    /// Drops a bucket recovered from persisted history back into the
    /// shard table and schedules its flush timer, the same way a freshly
    /// created bucket would get one from `ingest`. Without this, a bucket
    /// restored by `rebuild_from_history` would sit in memory forever —
    /// nothing else ever calls `schedule_flush` for a key that already
    /// exists in the shard table.
    pub async fn restore(&self, bucket: AggregationBucket) {
        let key = bucket.key.clone();
        let window = key.event_type.aggregation_window();
        self.shards.insert_or_absorb(&key, || bucket, |_| {}).await;

        match window {
            Some(window) => self.schedule_flush(key, window),
            None => {
                if let Some(bucket) = self.shards.take(&key).await {
                    self.sink.flush(bucket).await;
                }
            }
        }
    }

    /// Feeds one event into the engine. Events whose type has no
    /// aggregation window (mentions, bell posts) flush immediately as a
    /// single-actor bucket. Self-notifications are dropped before
    /// reaching any bucket.
    pub async fn ingest(&self, event: Event) {
        if event.is_self_notification() {
            debug!("dropping self-notification for user {}", event.target_user_id);
            return;
        }

        let event_type = event.event_type();
        let key = AggregationKey::new(event.target_user_id.clone(), event_type, event.target_ref.clone());
        let now = event.occurred_at;

        let Some(window) = event_type.aggregation_window() else {
            let bucket = AggregationBucket::new(key, event.actor_id.clone(), now);
            self.sink.flush(bucket).await;
            return;
        };

        let actor_id = event.actor_id.clone();
        let is_new = self
            .shards
            .insert_or_absorb(
                &key,
                || AggregationBucket::new(key.clone(), actor_id.clone(), now),
                |bucket| bucket.absorb(actor_id.clone(), now),
            )
            .await;

        if is_new {
            self.schedule_flush(key, window);
        }
    }

    fn schedule_flush(&self, key: AggregationKey, window: Duration) {
        let shards = self.shards.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let mut remaining = window;
            loop {
                tokio::time::sleep(DEBOUNCE_DELAY.min(remaining)).await;
                let now = chrono::Utc::now();
                let is_quiet = shards.inspect(&key, |bucket| bucket.is_expired(DEBOUNCE_DELAY, now)).await;

                if is_quiet {
                    break;
                }

                match remaining.checked_sub(DEBOUNCE_DELAY) {
                    Some(left) if left > Duration::ZERO => remaining = left,
                    _ => break,
                }
            }

            if let Some(bucket) = shards.take(&key).await {
                info!("flushing aggregation bucket for {:?} with {} events", bucket.key, bucket.count);
                sink.flush(bucket).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EventPayload, Priority, TargetKind, TargetRef};
    use tokio::sync::Mutex;

    struct RecordingSink {
        flushed: Mutex<Vec<AggregationBucket>>,
    }

    #[async_trait::async_trait]
    impl FlushSink for RecordingSink {
        async fn flush(&self, bucket: AggregationBucket) {
            self.flushed.lock().await.push(bucket);
        }
    }

    fn like_event(target_user: &str, actor: &str) -> Event {
        Event {
            event_id: uuid::Uuid::new_v4(),
            priority: Priority::Normal,
            actor_id: actor.to_string(),
            target_user_id: target_user.to_string(),
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            payload: EventPayload::Like { post_id: "post-1".to_string() },
            extra: Default::default(),
            occurred_at: chrono::Utc::now(),
        }
    }

    fn mention_event(target_user: &str, actor: &str) -> Event {
        Event {
            event_id: uuid::Uuid::new_v4(),
            priority: Priority::High,
            actor_id: actor.to_string(),
            target_user_id: target_user.to_string(),
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            payload: EventPayload::Mention { post_id: Some("post-1".to_string()), comment_id: None },
            extra: Default::default(),
            occurred_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn self_notification_never_reaches_sink() {
        let sink = Arc::new(RecordingSink { flushed: Mutex::new(vec![]) });
        let engine = AggregationEngine::new(4, sink.clone());
        engine.ingest(like_event("user-1", "user-1")).await;
        assert!(sink.flushed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn mention_flushes_immediately_without_window() {
        let sink = Arc::new(RecordingSink { flushed: Mutex::new(vec![]) });
        let engine = AggregationEngine::new(4, sink.clone());
        engine.ingest(mention_event("user-1", "actor-1")).await;
        assert_eq!(sink.flushed.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn second_like_absorbs_into_same_bucket_before_flush() {
        let sink = Arc::new(RecordingSink { flushed: Mutex::new(vec![]) });
        let engine = AggregationEngine::new(4, sink.clone());
        engine.ingest(like_event("user-1", "actor-1")).await;
        engine.ingest(like_event("user-1", "actor-2")).await;
        // Not flushed yet: bucket is still inside its debounce window.
        assert!(sink.flushed.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restored_bucket_still_flushes_on_its_own() {
        let sink = Arc::new(RecordingSink { flushed: Mutex::new(vec![]) });
        let engine = AggregationEngine::new(4, sink.clone());
        let key = AggregationKey::new("user-1", common::EventType::Like, TargetRef::new(TargetKind::Post, "post-1"));
        let bucket = AggregationBucket::new(key, "actor-1".to_string(), chrono::Utc::now());

        engine.restore(bucket).await;
        assert!(sink.flushed.lock().await.is_empty());

        tokio::time::advance(common::EventType::Like.aggregation_window().unwrap() + DEBOUNCE_DELAY).await;
        tokio::task::yield_now().await;

        assert_eq!(sink.flushed.lock().await.len(), 1);
    }
}
