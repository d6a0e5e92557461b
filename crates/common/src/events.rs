use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delivery priority. Also selects the bus topic an event travels on
/// (`notifications.{priority}`) — see [`EventEnvelope::topic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn topic(&self) -> &'static str {
        match self {
            Priority::High => "notifications.high",
            Priority::Normal => "notifications.normal",
            Priority::Low => "notifications.low",
        }
    }
}

/// The five domain event kinds this pipeline aggregates and delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Like,
    Comment,
    Follow,
    BellPost,
    Mention,
}

impl EventType {
    /// Default aggregation window. `None` means every event of this type
    /// fires its own notification (mentions, bell posts).
    pub fn aggregation_window(&self) -> Option<std::time::Duration> {
        match self {
            EventType::Like => Some(std::time::Duration::from_secs(5 * 60)),
            EventType::Comment => Some(std::time::Duration::from_secs(10 * 60)),
            EventType::Follow => Some(std::time::Duration::from_secs(30 * 60)),
            EventType::BellPost => None,
            EventType::Mention => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Comment,
    User,
}

/// The polymorphic `(type, id)` pair identifying what an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: String,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// Typed payload per event kind, with an opaque `extra` map on [`Event`]
/// for forward-compatible fields the producer may add later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Like { post_id: String },
    Comment { post_id: String, comment_id: String, excerpt: Option<String> },
    Follow,
    BellPost { post_id: String },
    Mention { post_id: Option<String>, comment_id: Option<String> },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Like { .. } => EventType::Like,
            EventPayload::Comment { .. } => EventType::Comment,
            EventPayload::Follow => EventType::Follow,
            EventPayload::BellPost { .. } => EventType::BellPost,
            EventPayload::Mention { .. } => EventType::Mention,
        }
    }
}

/// A unit produced on the event bus by a domain action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: uuid::Uuid,
    pub priority: Priority,
    pub actor_id: String,
    pub target_user_id: String,
    pub target_ref: TargetRef,
    pub payload: EventPayload,
    /// Forward-compatible extension fields; unknown producer fields land
    /// here instead of failing deserialization.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Self-notifications never reach the aggregator; see spec §4.2.
    pub fn is_self_notification(&self) -> bool {
        self.actor_id == self.target_user_id
    }
}

/// Wraps an [`Event`] with bus-transport bookkeeping: retry attempts and
/// the dead-letter decision. Mirrors the `attempt_count`/`max_attempts`
/// shape carried end to end with each message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub envelope_id: uuid::Uuid,
    pub event: Event,
    pub metadata: HashMap<String, String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            envelope_id: uuid::Uuid::new_v4(),
            event,
            metadata: HashMap::new(),
            attempt_count: 0,
            max_attempts: 3,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.event.priority.topic()
    }

    pub fn partition_key(&self) -> String {
        self.event.target_user_id.clone()
    }

    pub fn increment_attempt(&mut self) {
        self.attempt_count += 1;
    }

    pub fn should_dead_letter(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            event_id: uuid::Uuid::new_v4(),
            priority: Priority::Normal,
            actor_id: "user-a".to_string(),
            target_user_id: "user-r".to_string(),
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            payload: EventPayload::Like { post_id: "post-1".to_string() },
            extra: HashMap::new(),
            occurred_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn envelope_topic_follows_priority() {
        let envelope = EventEnvelope::new(sample_event());
        assert_eq!(envelope.topic(), "notifications.normal");
        assert_eq!(envelope.partition_key(), "user-r");
    }

    #[test]
    fn dead_letter_after_max_attempts() {
        let mut envelope = EventEnvelope::new(sample_event());
        assert!(!envelope.should_dead_letter());
        envelope.increment_attempt();
        envelope.increment_attempt();
        assert!(!envelope.should_dead_letter());
        envelope.increment_attempt();
        assert!(envelope.should_dead_letter());
    }

    #[test]
    fn self_notification_detected() {
        let mut event = sample_event();
        event.target_user_id = event.actor_id.clone();
        assert!(event.is_self_notification());
    }

    #[test]
    fn round_trips_through_json() {
        let envelope = EventEnvelope::new(sample_event());
        let json = serde_json::to_string(&envelope).expect("serialize");
        let back: EventEnvelope = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.event.event_id, envelope.event.event_id);
    }
}
