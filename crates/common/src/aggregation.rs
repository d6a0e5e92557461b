use crate::events::{EventType, TargetRef};
use serde::{Deserialize, Serialize};

/// Identifies the aggregation bucket an incoming event belongs to:
/// recipient + event type + the thing being acted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationKey {
    pub recipient_id: String,
    pub event_type: EventType,
    pub target_ref: TargetRef,
}

impl AggregationKey {
    pub fn new(recipient_id: impl Into<String>, event_type: EventType, target_ref: TargetRef) -> Self {
        Self { recipient_id: recipient_id.into(), event_type, target_ref }
    }
}

/// Accumulating state for a single aggregation key while its debounce
/// window is open. At most [`AggregationBucket::MAX_ACTORS`] distinct
/// actor IDs are retained; beyond that only `count` keeps growing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub key: AggregationKey,
    pub first_event_at: chrono::DateTime<chrono::Utc>,
    pub last_event_at: chrono::DateTime<chrono::Utc>,
    pub actor_ids: Vec<String>,
    pub count: u32,
    /// Set once the debounce timer fires and a `NotificationHistory` row
    /// has been created for this bucket's current cycle.
    pub notification_id: Option<uuid::Uuid>,
}

impl AggregationBucket {
    pub const MAX_ACTORS: usize = 10;

    pub fn new(key: AggregationKey, actor_id: String, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            key,
            first_event_at: now,
            last_event_at: now,
            actor_ids: vec![actor_id],
            count: 1,
            notification_id: None,
        }
    }

    /// Folds another event into the bucket, bumping `last_event_at` and
    /// appending the actor if there's room and it's not a duplicate.
    pub fn absorb(&mut self, actor_id: String, now: chrono::DateTime<chrono::Utc>) {
        self.last_event_at = now;
        self.count += 1;
        if self.actor_ids.len() < Self::MAX_ACTORS && !self.actor_ids.contains(&actor_id) {
            self.actor_ids.push(actor_id);
        }
    }

    pub fn is_expired(&self, window: std::time::Duration, now: chrono::DateTime<chrono::Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.last_event_at);
        elapsed.to_std().map(|d| d >= window).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TargetKind;

    fn key() -> AggregationKey {
        AggregationKey::new("recipient-1", EventType::Like, TargetRef::new(TargetKind::Post, "post-1"))
    }

    #[test]
    fn absorb_caps_actor_ids_but_keeps_counting() {
        let now = chrono::Utc::now();
        let mut bucket = AggregationBucket::new(key(), "actor-0".to_string(), now);
        for i in 1..15 {
            bucket.absorb(format!("actor-{i}"), now);
        }
        assert_eq!(bucket.count, 15);
        assert_eq!(bucket.actor_ids.len(), AggregationBucket::MAX_ACTORS);
    }

    #[test]
    fn duplicate_actor_does_not_grow_actor_list() {
        let now = chrono::Utc::now();
        let mut bucket = AggregationBucket::new(key(), "actor-0".to_string(), now);
        bucket.absorb("actor-0".to_string(), now);
        assert_eq!(bucket.actor_ids.len(), 1);
        assert_eq!(bucket.count, 2);
    }

    #[test]
    fn expiry_respects_window() {
        let now = chrono::Utc::now();
        let bucket = AggregationBucket::new(key(), "actor-0".to_string(), now);
        assert!(!bucket.is_expired(std::time::Duration::from_secs(300), now));
        let later = now + chrono::Duration::seconds(301);
        assert!(bucket.is_expired(std::time::Duration::from_secs(300), later));
    }
}
