use serde::{Deserialize, Serialize};

/// A row in the fallback queue: an event the bus could not durably accept
/// (or a channel send that exhausted its in-process retries), held for
/// the replay worker to retry on its own schedule. Grounded in the
/// transactional-outbox pattern: poll with `FOR UPDATE SKIP LOCKED`,
/// requeue with backoff, escalate to poisoned past a retry ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackQueueEntry {
    pub id: uuid::Uuid,
    pub event_data: serde_json::Value,
    pub topic: String,
    pub target_user_id: String,
    pub processed: bool,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub retry_count: u32,
    pub last_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FallbackQueueEntry {
    /// Past this many retries an entry is poisoned and stops being
    /// retried automatically.
    pub const MAX_RETRIES: u32 = 10;

    pub fn new(event_data: serde_json::Value, topic: impl Into<String>, target_user_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            event_data,
            topic: topic.into(),
            target_user_id: target_user_id.into(),
            processed: false,
            processed_at: None,
            retry_count: 0,
            last_retry_at: None,
            last_error: None,
            created_at: now,
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.retry_count >= Self::MAX_RETRIES
    }

    pub fn mark_processed(&mut self, at: chrono::DateTime<chrono::Utc>) {
        self.processed = true;
        self.processed_at = Some(at);
    }

    pub fn record_failure(&mut self, error: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        self.retry_count += 1;
        self.last_retry_at = Some(at);
        self.last_error = Some(error.into());
    }

    /// Past this age since `processed_at` a processed row is eligible for
    /// the janitor to delete.
    pub fn is_stale_for_cleanup(&self, now: chrono::DateTime<chrono::Utc>, retention: chrono::Duration) -> bool {
        match self.processed_at {
            Some(processed_at) => now.signed_duration_since(processed_at) >= retention,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_after_max_retries() {
        let mut entry = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        for _ in 0..FallbackQueueEntry::MAX_RETRIES {
            entry.record_failure("boom", chrono::Utc::now());
        }
        assert!(entry.is_poisoned());
    }

    #[test]
    fn unprocessed_entry_never_stale() {
        let entry = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        assert!(!entry.is_stale_for_cleanup(chrono::Utc::now() + chrono::Duration::days(30), chrono::Duration::days(7)));
    }

    #[test]
    fn processed_entry_stale_after_retention() {
        let mut entry = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        let processed_at = chrono::Utc::now() - chrono::Duration::days(8);
        entry.mark_processed(processed_at);
        assert!(entry.is_stale_for_cleanup(chrono::Utc::now(), chrono::Duration::days(7)));
    }
}
