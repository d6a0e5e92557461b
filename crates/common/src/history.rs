use crate::events::{EventType, Priority, TargetRef};
use serde::{Deserialize, Serialize};

/// Per-channel delivery outcome recorded on a [`NotificationHistory`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Partial,
    Delivered,
    Failed,
}

/// The durable, user-facing record of a (possibly aggregated)
/// notification, serving as the audit trail in lieu of a separate
/// delivery dead-letter topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationHistory {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub event_type: EventType,
    pub priority: Priority,
    pub target_ref: TargetRef,
    pub is_aggregated: bool,
    pub aggregated_count: u32,
    pub actor_ids: Vec<String>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivery_status: DeliveryStatus,
    pub channels_attempted: Vec<String>,
    pub channels_delivered: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl NotificationHistory {
    pub fn mark_read(&mut self, at: chrono::DateTime<chrono::Utc>) {
        self.is_read = true;
        self.read_at = Some(at);
    }

    /// Recomputes `delivery_status` from the attempted/delivered channel
    /// sets. Called after every channel worker completes a send.
    pub fn recompute_delivery_status(&mut self) {
        self.delivery_status = if self.channels_attempted.is_empty() {
            DeliveryStatus::Pending
        } else if self.channels_delivered.is_empty() {
            DeliveryStatus::Failed
        } else if self.channels_delivered.len() < self.channels_attempted.len() {
            DeliveryStatus::Partial
        } else {
            DeliveryStatus::Delivered
        };
        self.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TargetKind;

    fn sample() -> NotificationHistory {
        NotificationHistory {
            id: uuid::Uuid::new_v4(),
            user_id: "user-1".to_string(),
            event_type: EventType::Like,
            priority: Priority::Normal,
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            is_aggregated: false,
            aggregated_count: 1,
            actor_ids: vec!["actor-1".to_string()],
            title: "New like".to_string(),
            message: "actor-1 liked your post".to_string(),
            is_read: false,
            read_at: None,
            delivery_status: DeliveryStatus::Pending,
            channels_attempted: vec![],
            channels_delivered: vec![],
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn delivery_status_partial_when_some_channels_fail() {
        let mut history = sample();
        history.channels_attempted = vec!["push".to_string(), "email".to_string()];
        history.channels_delivered = vec!["push".to_string()];
        history.recompute_delivery_status();
        assert_eq!(history.delivery_status, DeliveryStatus::Partial);
    }

    #[test]
    fn delivery_status_delivered_when_all_succeed() {
        let mut history = sample();
        history.channels_attempted = vec!["push".to_string()];
        history.channels_delivered = vec!["push".to_string()];
        history.recompute_delivery_status();
        assert_eq!(history.delivery_status, DeliveryStatus::Delivered);
    }

    #[test]
    fn mark_read_sets_timestamp() {
        let mut history = sample();
        let at = chrono::Utc::now();
        history.mark_read(at);
        assert!(history.is_read);
        assert_eq!(history.read_at, Some(at));
    }
}
