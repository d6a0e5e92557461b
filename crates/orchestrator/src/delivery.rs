use aggregator::FlushSink;
use async_trait::async_trait;
use channels::ChannelWorkerPool;
use common::{
    AggregationBucket, ChannelEnvelope, ChannelKind, ChannelSendResult, NotificationHistory, NotificationPreference,
};
use std::collections::HashMap;
use std::sync::Arc;
use store::{NotificationHistoryStore, PreferenceStore};
use tracing::{info, warn};
use uuid::Uuid;

/// Turns a flushed aggregation bucket into rendered notification copy.
/// Kept as a free function so it's trivially unit-testable without
/// standing up stores or channel pools.
pub fn render_title_and_message(bucket: &AggregationBucket) -> (String, String) {
    use common::EventType;
    let actor_count = bucket.actor_ids.len().max(1);
    let first_actor = bucket.actor_ids.first().cloned().unwrap_or_else(|| "Someone".to_string());

    match bucket.key.event_type {
        EventType::Like => {
            if bucket.count <= 1 {
                (format!("{first_actor} liked your post"), "Tap to view.".to_string())
            } else if actor_count == 1 {
                (format!("{first_actor} liked your post {} times", bucket.count), "Tap to view.".to_string())
            } else {
                (format!("{first_actor} and {} others liked your post", actor_count.saturating_sub(1)), "Tap to view.".to_string())
            }
        }
        EventType::Comment => {
            if actor_count == 1 {
                (format!("{first_actor} commented on your post"), "Tap to view the comment.".to_string())
            } else {
                (format!("{first_actor} and {} others commented on your post", actor_count.saturating_sub(1)), "Tap to view the comments.".to_string())
            }
        }
        EventType::Follow => {
            if actor_count == 1 {
                (format!("{first_actor} started following you"), "Tap to view their profile.".to_string())
            } else {
                (format!("{first_actor} and {} others started following you", actor_count.saturating_sub(1)), "Tap to view.".to_string())
            }
        }
        EventType::BellPost => (format!("{first_actor} posted something new"), "Tap to view.".to_string()),
        EventType::Mention => (format!("{first_actor} mentioned you"), "Tap to view.".to_string()),
    }
}

/// Selects the channels a user should receive a notification on, honoring
/// per-channel opt-in, mute, and DND gating.
pub fn eligible_channels(preference: &NotificationPreference, event_type: common::EventType, now: chrono::DateTime<chrono::Utc>) -> Vec<ChannelKind> {
    if !common::dnd::should_deliver_now(preference, event_type, now) {
        return vec![];
    }
    let mut channels = vec![];
    if preference.push_enabled {
        channels.push(ChannelKind::Push);
    }
    if preference.email_enabled {
        channels.push(ChannelKind::Email);
    }
    if preference.sms_enabled {
        channels.push(ChannelKind::Sms);
    }
    channels
}

/// Fans a flushed aggregation bucket out to the user's enabled channels,
/// recording the outcome on a `NotificationHistory` row. Implements
/// [`FlushSink`] so it plugs directly into `AggregationEngine`.
pub struct DeliveryOrchestrator {
    preferences: Arc<dyn PreferenceStore>,
    history: Arc<dyn NotificationHistoryStore>,
    channel_pools: HashMap<ChannelKind, Arc<ChannelWorkerPool>>,
}

impl DeliveryOrchestrator {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        history: Arc<dyn NotificationHistoryStore>,
        channel_pools: HashMap<ChannelKind, Arc<ChannelWorkerPool>>,
    ) -> Self {
        Self { preferences, history, channel_pools }
    }

    fn recipient_address<'a>(kind: ChannelKind, preference: &'a NotificationPreference) -> Option<&'a str> {
        match kind {
            ChannelKind::Push => Some(preference.user_id.as_str()),
            ChannelKind::Email => preference.email_address.as_deref(),
            ChannelKind::Sms => preference.phone_number.as_deref(),
        }
    }

    /// Dispatches to every eligible channel for `history`, skipping
    /// channels already recorded as attempted — this is what keeps a
    /// retried dispatch idempotent per (notification_id, channel) as
    /// required by.
    async fn dispatch(&self, history: &mut NotificationHistory, preference: &NotificationPreference) {
        let now = chrono::Utc::now();
        for kind in eligible_channels(preference, history.event_type, now) {
            if history.channels_attempted.contains(&kind.as_str().to_string()) {
                continue;
            }
            let Some(pool) = self.channel_pools.get(&kind) else {
                warn!("no worker pool registered for channel {:?}", kind);
                continue;
            };
            let Some(address) = Self::recipient_address(kind, preference) else {
                continue;
            };

            history.channels_attempted.push(kind.as_str().to_string());

            let envelope = ChannelEnvelope {
                notification_id: history.id,
                user_id: history.user_id.clone(),
                title: history.title.clone(),
                message: history.message.clone(),
                recipient_address: address.to_string(),
                metadata: history.metadata.clone(),
            };

            match pool.dispatch(envelope).await {
                ChannelSendResult::Delivered => {
                    history.channels_delivered.push(kind.as_str().to_string());
                }
                ChannelSendResult::RetryableFailure(msg) | ChannelSendResult::PermanentFailure(msg) => {
                    warn!("channel {:?} failed for notification {}: {}", kind, history.id, msg);
                }
            }
        }
        history.recompute_delivery_status();
    }

    fn notification_id_for(bucket: &AggregationBucket) -> Uuid {
        bucket.notification_id.unwrap_or_else(Uuid::new_v4)
    }
}

#[async_trait]
impl FlushSink for DeliveryOrchestrator {
    async fn flush(&self, bucket: AggregationBucket) {
        let preference = match self.preferences.get(&bucket.key.recipient_id).await {
            Ok(preference) => preference,
            Err(e) => {
                warn!("failed to load preference for {}: {}", bucket.key.recipient_id, e);
                return;
            }
        };

        let (title, message) = render_title_and_message(&bucket);
        let mut history = NotificationHistory {
            id: Self::notification_id_for(&bucket),
            user_id: bucket.key.recipient_id.clone(),
            event_type: bucket.key.event_type,
            priority: common::Priority::Normal,
            target_ref: bucket.key.target_ref.clone(),
            is_aggregated: bucket.count > 1,
            aggregated_count: bucket.count,
            actor_ids: bucket.actor_ids.clone(),
            title,
            message,
            is_read: false,
            read_at: None,
            delivery_status: common::DeliveryStatus::Pending,
            channels_attempted: vec![],
            channels_delivered: vec![],
            metadata: serde_json::json!({}),
            created_at: bucket.first_event_at,
            updated_at: bucket.last_event_at,
        };

        self.dispatch(&mut history, &preference).await;

        if let Err(e) = self.history.insert(&history).await {
            warn!("failed to persist notification history {}: {}", history.id, e);
            return;
        }

        info!("delivered notification {} to user {} via {:?}", history.id, history.user_id, history.channels_delivered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregationKey, EventType, TargetKind, TargetRef};

    fn bucket(event_type: EventType, count: u32, actors: Vec<&str>) -> AggregationBucket {
        let now = chrono::Utc::now();
        AggregationBucket {
            key: AggregationKey::new("user-1", event_type, TargetRef::new(TargetKind::Post, "post-1")),
            first_event_at: now,
            last_event_at: now,
            actor_ids: actors.into_iter().map(String::from).collect(),
            count,
            notification_id: None,
        }
    }

    #[test]
    fn single_like_renders_singular_title() {
        let (title, _) = render_title_and_message(&bucket(EventType::Like, 1, vec!["Ada"]));
        assert_eq!(title, "Ada liked your post");
    }

    #[test]
    fn multi_actor_like_renders_others_count() {
        let (title, _) = render_title_and_message(&bucket(EventType::Like, 5, vec!["Ada", "Grace", "Linus"]));
        assert_eq!(title, "Ada and 2 others liked your post");
    }

    #[test]
    fn dnd_suppresses_all_channels() {
        let mut preference = NotificationPreference::default_for("user-1");
        preference.dnd_enabled = true;
        preference.dnd_start = Some("00:00".to_string());
        preference.dnd_end = Some("23:59".to_string());
        let channels = eligible_channels(&preference, EventType::Like, chrono::Utc::now());
        assert!(channels.is_empty());
    }

    #[test]
    fn enabled_channels_are_selected_when_not_suppressed() {
        let preference = NotificationPreference::default_for("user-1");
        let channels = eligible_channels(&preference, EventType::Like, chrono::Utc::now());
        assert!(channels.contains(&ChannelKind::Push));
        assert!(channels.contains(&ChannelKind::Email));
        assert!(!channels.contains(&ChannelKind::Sms));
    }
}
